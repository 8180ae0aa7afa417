pub mod genome_fragment;
pub mod phasing_engine;
pub mod profile_seq;
pub mod reference;
pub mod rescue;
pub mod rp_hmm;
