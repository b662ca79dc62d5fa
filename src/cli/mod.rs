pub mod app;
pub mod capture;
pub mod classify;
pub mod commands;
pub mod context;
pub mod dispatch;
pub mod env;
pub mod output;
pub mod replay;
pub mod rules;
pub mod runtime;
