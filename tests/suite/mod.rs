mod config;
mod lifecycle;
mod properties;
mod scenarios;
