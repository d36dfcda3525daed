//! Common test utilities for tagging runs
//!
//! Integration tests drive a real [`ai_tagger::Tagger`] against the
//! in-memory library and the scripted AI client.

#![allow(dead_code)]

pub mod archive;
pub mod fixture;

pub use archive::{scratch_files, write_zip};
pub use fixture::{RecordingProgress, TestLibrary};
