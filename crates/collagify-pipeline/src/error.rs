use std::fmt;

use thiserror::Error;

/// Step of a run at which a channel or day group failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Drain,
    Fetch,
    Tile,
    Send,
    DeleteMessages,
    DeleteLinks,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Drain => "drain links",
            Self::Fetch => "fetch image",
            Self::Tile => "build collage",
            Self::Send => "send collage",
            Self::DeleteMessages => "delete source messages",
            Self::DeleteLinks => "delete stored links",
        };
        f.write_str(name)
    }
}

/// One isolated failure inside a run. Never aborts the run on its own.
#[derive(Debug)]
pub struct Failure {
    pub channel_id: i64,
    /// Day label of the group, when the failure is scoped to one.
    pub day: Option<String>,
    pub stage: FailureStage,
    pub error: anyhow::Error,
}

impl Failure {
    pub fn channel(channel_id: i64, stage: FailureStage, error: impl Into<anyhow::Error>) -> Self {
        Self {
            channel_id,
            day: None,
            stage,
            error: error.into(),
        }
    }

    pub fn group(
        channel_id: i64,
        day: &str,
        stage: FailureStage,
        error: impl Into<anyhow::Error>,
    ) -> Self {
        Self {
            channel_id,
            day: Some(day.to_string()),
            stage,
            error: error.into(),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.day {
            Some(day) => write!(
                f,
                "channel {} day {}: {}: {:#}",
                self.channel_id, day, self.stage, self.error
            ),
            None => write!(f, "channel {}: {}: {:#}", self.channel_id, self.stage, self.error),
        }
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    /// Nothing could be processed at all.
    #[error("list channels: {0:#}")]
    ListChannels(anyhow::Error),

    /// Every per-channel / per-group failure of a run that otherwise completed.
    #[error("{} failure(s) during collage run: {}", .0.len(), join(.0))]
    Failures(Vec<Failure>),
}

impl RunError {
    pub fn failures(&self) -> &[Failure] {
        match self {
            Self::ListChannels(_) => &[],
            Self::Failures(failures) => failures,
        }
    }
}

fn join(failures: &[Failure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
