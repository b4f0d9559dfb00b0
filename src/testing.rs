// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Test doubles shared across unit tests.

use crate::{
    tool::{self, MediaToolRunner, ToolCommand, ToolOutput},
    upload::{self, ObjectStore},
};

use async_trait::async_trait;
use bytes::Bytes;
use std::{path::Path, sync::Mutex};

type Handler = dyn Fn(&ToolCommand) -> tool::Result<ToolOutput> + Send + Sync;

/// Scripted tool runner that records every invocation.
pub(crate) struct FakeRunner {
    handler: Box<Handler>,
    calls: Mutex<Vec<ToolCommand>>,
}

impl FakeRunner {
    pub(crate) fn new(
        handler: impl Fn(&ToolCommand) -> tool::Result<ToolOutput> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Runner where every tool succeeds and writes `data` to its output.
    pub(crate) fn writing(data: &'static [u8]) -> Self {
        Self::new(move |command| Ok(write_output(command, data)))
    }

    pub(crate) fn calls(&self) -> Vec<ToolCommand> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    pub(crate) fn calls_to(&self, program: &str) -> Vec<ToolCommand> {
        self.calls()
            .into_iter()
            .filter(|command| command.program() == program)
            .collect()
    }
}

#[async_trait]
impl MediaToolRunner for FakeRunner {
    async fn run(&self, command: &ToolCommand) -> tool::Result<ToolOutput> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(command.clone());
        }
        (self.handler)(command)
    }
}

/// Successful output carrying target stdout.
pub(crate) fn ok(stdout: impl Into<Vec<u8>>) -> ToolOutput {
    ToolOutput {
        stdout: stdout.into(),
        stderr: Vec::new(),
        exit_code: Some(0),
    }
}

/// Failed output carrying target stderr.
pub(crate) fn failed(stderr: impl Into<Vec<u8>>) -> ToolOutput {
    ToolOutput {
        stdout: Vec::new(),
        stderr: stderr.into(),
        exit_code: Some(1),
    }
}

/// Write `data` to the output path of a media tool command.
pub(crate) fn write_output(command: &ToolCommand, data: &[u8]) -> ToolOutput {
    if let Some(path) = command.last_arg() {
        let path = Path::new(path);
        if path.parent().is_some_and(Path::exists) {
            let _ = std::fs::write(path, data);
        }
    }
    ok(Vec::new())
}

/// Minimal ffprobe JSON document for a video stream.
pub(crate) fn ffprobe_video_json(codec: &str, duration: Option<f64>) -> String {
    let duration = match duration {
        Some(duration) => format!(r#", "duration": "{duration}""#),
        None => String::new(),
    };
    format!(
        r#"{{
            "streams": [
                {{ "codec_type": "video", "codec_name": "{codec}", "width": 1920, "height": 1080 }},
                {{ "codec_type": "audio", "codec_name": "aac" }}
            ],
            "format": {{ "format_name": "mov,mp4,m4a,3gp,3g2,mj2"{duration} }}
        }}"#
    )
}

/// Tiny MP4 skeleton with `moov` ahead of `mdat` when `fast_start` is set.
pub(crate) fn mp4_boxes(fast_start: bool) -> Vec<u8> {
    fn atom(kind: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = ((body.len() + 8) as u32).to_be_bytes().to_vec();
        out.extend_from_slice(kind);
        out.extend_from_slice(body);
        out
    }

    let ftyp = atom(b"ftyp", b"isom\0\0\x02\0isomiso2avc1mp41");
    let moov = atom(b"moov", &[0u8; 16]);
    let mdat = atom(b"mdat", &[0xAB; 64]);

    let mut out = ftyp;
    if fast_start {
        out.extend(moov);
        out.extend(mdat);
    } else {
        out.extend(mdat);
        out.extend(moov);
    }
    out
}

/// Object store that keeps everything in memory.
#[derive(Debug, Default)]
pub(crate) struct MemoryStore {
    pub(crate) objects: Mutex<Vec<(String, Bytes, String)>>,
}

impl MemoryStore {
    pub(crate) fn keys(&self) -> Vec<String> {
        self.objects
            .lock()
            .map(|objects| objects.iter().map(|(key, _, _)| key.clone()).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
        progress: &(dyn Fn(u64) + Send + Sync),
    ) -> upload::Result<()> {
        let half = body.len() as u64 / 2;
        progress(half);
        progress(body.len() as u64);
        if let Ok(mut objects) = self.objects.lock() {
            objects.push((key.to_string(), body, content_type.to_string()));
        }
        Ok(())
    }
}
