// homebites/server/src/services/mod.rs

pub mod gemini_oracle;
pub mod mongo_store;

pub use gemini_oracle::GeminiOracle;
pub use mongo_store::MongoStore;
