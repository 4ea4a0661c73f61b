mod common;
mod controller;
mod persistence;
