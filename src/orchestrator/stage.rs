use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Named stages of an analysis run, in the order they are reached.
///
/// `Failed` is reachable from any non-terminal stage; every other transition moves
/// exactly one step forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunStage {
    Started,
    FileStaged,
    UnitsProposed,
    SummaryGenerated,
    ReportGenerated,
    Complete,
    Failed,
}

impl RunStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStage::Started => "Started",
            RunStage::FileStaged => "FileStaged",
            RunStage::UnitsProposed => "UnitsProposed",
            RunStage::SummaryGenerated => "SummaryGenerated",
            RunStage::ReportGenerated => "ReportGenerated",
            RunStage::Complete => "Complete",
            RunStage::Failed => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStage::Complete | RunStage::Failed)
    }

    pub fn next(&self) -> Option<RunStage> {
        match self {
            RunStage::Started => Some(RunStage::FileStaged),
            RunStage::FileStaged => Some(RunStage::UnitsProposed),
            RunStage::UnitsProposed => Some(RunStage::SummaryGenerated),
            RunStage::SummaryGenerated => Some(RunStage::ReportGenerated),
            RunStage::ReportGenerated => Some(RunStage::Complete),
            RunStage::Complete | RunStage::Failed => None,
        }
    }

    pub fn can_advance_to(&self, target: RunStage) -> bool {
        if self.is_terminal() {
            return false;
        }
        target == RunStage::Failed || self.next() == Some(target)
    }
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStage {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Started" => Ok(RunStage::Started),
            "FileStaged" => Ok(RunStage::FileStaged),
            "UnitsProposed" => Ok(RunStage::UnitsProposed),
            "SummaryGenerated" => Ok(RunStage::SummaryGenerated),
            "ReportGenerated" => Ok(RunStage::ReportGenerated),
            "Complete" => Ok(RunStage::Complete),
            "Failed" => Ok(RunStage::Failed),
            other => Err(format!("unknown run stage '{}'", other)),
        }
    }
}

/// Outcome of one analysis unit, serialized as `0`, `1` or `-1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum UnitOutcome {
    Pending,
    Done,
    Failed,
}

impl UnitOutcome {
    pub fn code(&self) -> i8 {
        match self {
            UnitOutcome::Pending => 0,
            UnitOutcome::Done => 1,
            UnitOutcome::Failed => -1,
        }
    }

    pub fn is_final(&self) -> bool {
        !matches!(self, UnitOutcome::Pending)
    }

    /// Outcomes only move out of `Pending`, never back and never between final values.
    pub fn can_transition_to(&self, target: UnitOutcome) -> bool {
        *self == UnitOutcome::Pending && target.is_final()
    }
}

impl From<UnitOutcome> for i8 {
    fn from(outcome: UnitOutcome) -> Self {
        outcome.code()
    }
}

impl TryFrom<i8> for UnitOutcome {
    type Error = String;

    fn try_from(code: i8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(UnitOutcome::Pending),
            1 => Ok(UnitOutcome::Done),
            -1 => Ok(UnitOutcome::Failed),
            other => Err(format!("invalid unit outcome code {}", other)),
        }
    }
}
