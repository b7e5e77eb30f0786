use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use svadharma_common::roadmap::SavedRoadmap;

use crate::counselor::AiOutcome;
use crate::model::{CourseRecord, ExamRecord, IitSection, TopIit};
use crate::view::View;

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct NavigateParams {
    /// One of: home, exams, courses, ai-counselor, iit.
    pub view: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SearchExamsParams {
    /// Text matched against exam name, category, eligibility and description. Omit to keep the current query.
    pub query: Option<String>,
    /// Stream selector: All, PCM, PCB, Science, Commerce, Humanities or Any. Omit to keep the current one.
    pub stream: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExamIdParams {
    /// Exam identifier such as "jee-main" or "neet".
    pub exam_id: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AiSearchExamsParams {
    /// Replaces the exam search query before searching. Omit to search the current query.
    pub query: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListCoursesParams {
    /// Text matched against course title and overview. Omit to keep the current query.
    pub query: Option<String>,
    /// Open or close the skill/career filter panel.
    pub filter_panel_open: Option<bool>,
}

#[derive(Debug, Clone, Copy, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CourseFilterKind {
    Skill,
    Career,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ToggleCourseFilterParams {
    pub kind: CourseFilterKind,
    /// A tag from the skill_options or career_options of the courses screen.
    pub tag: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SearchIitParams {
    pub query: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AskCounselorParams {
    /// The student's question, e.g. "How do I become a data scientist?"
    pub query: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RoadmapIdParams {
    pub roadmap_id: String,
}

/// What the active screen renders.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ScreenSnapshot {
    pub view: View,
    /// Incremented on every view change; a client scrolls to the top when it moves.
    pub scroll_resets: u64,
    pub screen: Screen,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Screen {
    Home {
        exam_count: usize,
        course_count: usize,
        saved_roadmaps: Vec<RoadmapSummary>,
    },
    Exams {
        query: String,
        stream: String,
        stream_choices: Vec<String>,
        exams: Vec<ExamRecord>,
        ai_search: AiPanel,
    },
    Courses {
        query: String,
        filter_panel_open: bool,
        skill_options: Vec<String>,
        career_options: Vec<String>,
        selected_skills: Vec<String>,
        selected_careers: Vec<String>,
        active_filter_count: usize,
        courses: Vec<CourseRecord>,
    },
    AiCounselor {
        query: String,
        saved: bool,
        answer: AiPanel,
    },
    RoadmapDetail {
        roadmap: SavedRoadmap,
    },
    ExamDetail {
        exam: ExamRecord,
        deep_info: AiPanel,
    },
    Iit {
        query: String,
        top_iits: Vec<TopIit>,
        sections: Vec<IitSection>,
    },
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct AiPanel {
    pub loading: bool,
    /// Absent until a request completes.
    pub outcome: Option<AiOutcome>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct RoadmapSummary {
    pub id: String,
    pub title: String,
    pub date: String,
}

impl From<&SavedRoadmap> for RoadmapSummary {
    fn from(roadmap: &SavedRoadmap) -> Self {
        Self {
            id: roadmap.id.clone(),
            title: roadmap.title.clone(),
            date: roadmap.date.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct SaveRoadmapResponse {
    pub roadmap: SavedRoadmap,
    pub screen: ScreenSnapshot,
}
