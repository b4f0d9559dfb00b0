// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Share media and files from the command line.
//!
//! A single run takes bytes from a file, standard input, or the clipboard,
//! fixes whatever would keep them from playing or displaying on the web,
//! transcodes them to the requested format, uploads the result to an S3
//! compatible object store, and copies the public URL to the clipboard.
//!
//! Heavy lifting is delegated to external media tools (`ffmpeg`, `ffprobe`,
//! and ImageMagick), invoked through [`tool::MediaToolRunner`] so the whole
//! pipeline can run against fakes.

pub mod clipboard;
pub mod config;
pub mod filename;
pub mod media;
pub mod path;
pub mod pipeline;
pub mod source;
pub mod tool;
pub mod ui;
pub mod upload;

#[cfg(test)]
mod testing;
