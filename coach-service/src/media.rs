//! Video compositing and thumbnail extraction through ffmpeg.

use std::ffi::OsStr;
use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::MediaError;

/// Side-by-side layout: both inputs scaled to 960px high, stacked, padded to 1080x1920
const STACK_FILTER: &str = "[0:v]scale=-1:960[video1];[1:v]scale=-1:960[video2];[video1][video2]hstack[stacked];[stacked]pad=1080:1920:(ow-iw)/2:(oh-ih)/2:black";

/// Local media operations used by the analysis pipeline
#[async_trait]
pub trait MediaTools: Send + Sync {
    /// Compose `input` beside `reference` into `output`
    async fn stack_with_reference(
        &self,
        input: &Path,
        reference: &Path,
        output: &Path,
    ) -> Result<(), MediaError>;

    /// Write a JPEG frame taken one second into `input`
    async fn extract_thumbnail(&self, input: &Path, output: &Path) -> Result<(), MediaError>;
}

/// [`MediaTools`] running the ffmpeg binary
pub struct FfmpegMedia {
    program: String,
}

impl FfmpegMedia {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run<I, S>(&self, args: I) -> Result<(), MediaError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let output = Command::new(&self.program)
            .args(args)
            .output()
            .await
            .map_err(|e| MediaError::Spawn {
                program: self.program.clone(),
                source: e,
            })?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(MediaError::Failed {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: stderr.lines().last().unwrap_or("unknown error").to_string(),
            })
        }
    }
}

pub(crate) fn stack_args<'a>(input: &'a Path, reference: &'a Path, output: &'a Path) -> Vec<&'a OsStr> {
    let mut args = vec![
        OsStr::new("-i"),
        input.as_os_str(),
        OsStr::new("-i"),
        reference.as_os_str(),
        OsStr::new("-filter_complex"),
        OsStr::new(STACK_FILTER),
    ];
    args.extend(
        [
            "-c:v", "mpeg4", "-q:v", "5", "-pix_fmt", "yuv420p", "-r", "29.79",
            "-metadata:s:v", "rotate=0", "-y",
        ]
        .into_iter()
        .map(OsStr::new),
    );
    args.push(output.as_os_str());
    args
}

pub(crate) fn thumbnail_args<'a>(input: &'a Path, output: &'a Path) -> Vec<&'a OsStr> {
    vec![
        OsStr::new("-ss"),
        OsStr::new("00:00:01"),
        OsStr::new("-i"),
        input.as_os_str(),
        OsStr::new("-vframes"),
        OsStr::new("1"),
        OsStr::new("-vcodec"),
        OsStr::new("mjpeg"),
        OsStr::new("-y"),
        output.as_os_str(),
    ]
}

#[async_trait]
impl MediaTools for FfmpegMedia {
    async fn stack_with_reference(
        &self,
        input: &Path,
        reference: &Path,
        output: &Path,
    ) -> Result<(), MediaError> {
        debug!(input = %input.display(), reference = %reference.display(), "Compositing video");
        self.run(stack_args(input, reference, output)).await
    }

    async fn extract_thumbnail(&self, input: &Path, output: &Path) -> Result<(), MediaError> {
        debug!(input = %input.display(), "Extracting thumbnail");
        self.run(thumbnail_args(input, output)).await
    }
}
