use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// An undergraduate entrance exam.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExamRecord {
    /// Stable identifier, e.g. "jee-main", "neet"
    pub id: String,
    pub name: String,
    pub category: ExamCategory,
    pub scope: Scope,
    /// Academic stream the exam is open to, used for eligibility filtering
    pub stream: Stream,
    pub description: String,
    /// Free-text eligibility, e.g. "12th Pass with PCM (min 60% aggregate)"
    pub eligibility: String,
    pub website: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_papers_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ExamCategory {
    Engineering,
    Medical,
    Management,
    Law,
    Design,
    Arts,
    International,
    Other,
}

impl ExamCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Engineering => "Engineering",
            Self::Medical => "Medical",
            Self::Management => "Management",
            Self::Law => "Law",
            Self::Design => "Design",
            Self::Arts => "Arts",
            Self::International => "International",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for ExamCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Scope {
    India,
    Global,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Stream {
    #[serde(rename = "PCM")]
    Pcm,
    #[serde(rename = "PCB")]
    Pcb,
    Commerce,
    Humanities,
    Any,
    Science,
}

impl Stream {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pcm => "PCM",
            Self::Pcb => "PCB",
            Self::Commerce => "Commerce",
            Self::Humanities => "Humanities",
            Self::Any => "Any",
            Self::Science => "Science",
        }
    }
}

/// Stream selector of the exam list: "All" or one concrete stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamFilter {
    #[default]
    All,
    Only(Stream),
}

impl StreamFilter {
    /// Selector choices in display order.
    pub const CHOICES: [StreamFilter; 7] = [
        StreamFilter::All,
        StreamFilter::Only(Stream::Pcm),
        StreamFilter::Only(Stream::Pcb),
        StreamFilter::Only(Stream::Science),
        StreamFilter::Only(Stream::Commerce),
        StreamFilter::Only(Stream::Humanities),
        StreamFilter::Only(Stream::Any),
    ];

    /// Whether an exam restricted to `stream` is shown under this selector.
    ///
    /// "Science" groups PCM, PCB and Science; every other concrete stream matches itself.
    /// Exams open to any stream pass every selector.
    pub fn admits(self, stream: Stream) -> bool {
        match self {
            Self::All => true,
            Self::Only(Stream::Science) => matches!(
                stream,
                Stream::Pcm | Stream::Pcb | Stream::Science | Stream::Any
            ),
            Self::Only(selected) => stream == selected || stream == Stream::Any,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "All",
            Self::Only(stream) => stream.as_str(),
        }
    }
}

impl fmt::Display for StreamFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StreamFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::CHOICES
            .into_iter()
            .find(|choice| choice.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                let available: Vec<&str> = Self::CHOICES.iter().map(|c| c.as_str()).collect();
                format!(
                    "unknown stream: '{wanted}'. Available streams: {}",
                    available.join(", ")
                )
            })
    }
}

/// A degree program with its career outcomes and the skills it expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CourseRecord {
    pub id: String,
    pub title: String,
    /// e.g. "4 Years"
    pub duration: String,
    pub overview: String,
    pub career_options: Vec<String>,
    pub required_skills: Vec<String>,
    pub internships: String,
    pub top_recruiters: Vec<String>,
    pub future_scope: String,
}

/// One row of the IIT ranking table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TopIit {
    pub name: String,
    pub rank: u32,
    pub programs: String,
    pub link: String,
}

/// A searchable section of the IIT guide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IitSection {
    pub id: String,
    pub name: String,
    /// Keywords the section search matches against
    pub text: String,
    /// Exam whose deep info the section links to, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exam_id: Option<String>,
}
