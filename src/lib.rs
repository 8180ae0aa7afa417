#[macro_use]
extern crate log;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate serde_derive;

pub mod bubble;
pub mod evaluation;
pub mod model;
pub mod pair_hmm;
pub mod params;
pub mod phasing;
pub mod poa;
pub mod reads;
pub mod sequence;
pub mod utils;
