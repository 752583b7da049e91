//! This module acts as a central hub for all database-related logic.
//! It declares the specialized submodules so they can be accessed from
//! elsewhere in the application via their full path, e.g.,
//! `database::rooms::create_room`.

pub mod catalog;
pub mod games;
pub mod init;
pub mod models;
pub mod rooms;
