pub mod chunk_read;
