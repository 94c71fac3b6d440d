// homebites/server/src/web/handlers/mod.rs

pub mod query_handlers;
