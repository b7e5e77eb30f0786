/// Screen selection and per-screen transient state.
///
/// All mutation is synchronous. Gateway requests are split into `begin_*`, which marks the
/// slot loading and hands out an [`AiTicket`], and [`ViewController::complete`], which
/// commits an outcome only if the ticket still belongs to the latest request on that slot.
use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::Serialize;
use svadharma_common::gemini::AiResponse;
use svadharma_common::roadmap::SavedRoadmap;

use crate::catalog::Catalog;
use crate::counselor::{AiOutcome, Prompt};
use crate::error::AppError;
use crate::filter;
use crate::model::{CourseRecord, ExamRecord, IitSection, StreamFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum View {
    #[default]
    Home,
    Exams,
    Courses,
    AiCounselor,
    RoadmapDetail,
    ExamDetail,
    Iit,
}

impl View {
    pub const ALL: [View; 7] = [
        View::Home,
        View::Exams,
        View::Courses,
        View::AiCounselor,
        View::RoadmapDetail,
        View::ExamDetail,
        View::Iit,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::Exams => "exams",
            Self::Courses => "courses",
            Self::AiCounselor => "ai-counselor",
            Self::RoadmapDetail => "roadmap-detail",
            Self::ExamDetail => "exam-detail",
            Self::Iit => "iit",
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for View {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                let available: Vec<&str> = Self::ALL.iter().map(|v| v.as_str()).collect();
                format!("unknown view: '{wanted}'. Available views: {}", available.join(", "))
            })
    }
}

/// Which gateway-backed panel a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AiChannel {
    /// Exam detail screen
    DeepInfo,
    /// "Deep Search AI" on the exam list
    ExamSearch,
    /// Counselor screen
    Counselor,
}

/// Handle for one in-flight gateway request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiTicket {
    pub channel: AiChannel,
    pub generation: u64,
    pub prompt: Prompt,
}

/// Loading flag and latest committed outcome of one gateway-backed panel.
#[derive(Debug, Clone, Default)]
pub struct AiSlot {
    pub loading: bool,
    pub generation: u64,
    last_prompt: Option<Prompt>,
    /// `None` until a request completes, or after the result is dismissed
    pub outcome: Option<AiOutcome>,
}

impl AiSlot {
    fn begin(&mut self, channel: AiChannel, prompt: Prompt) -> AiTicket {
        self.generation += 1;
        self.loading = true;
        self.outcome = None;
        self.last_prompt = Some(prompt.clone());
        AiTicket {
            channel,
            generation: self.generation,
            prompt,
        }
    }

    fn complete(&mut self, generation: u64, outcome: AiOutcome) -> bool {
        if generation != self.generation {
            return false;
        }
        self.loading = false;
        self.outcome = Some(outcome);
        true
    }

    /// Drop the visible result and orphan any in-flight request.
    fn reset(&mut self) {
        self.generation += 1;
        self.loading = false;
        self.last_prompt = None;
        self.outcome = None;
    }
}

#[derive(Debug, Default)]
pub struct ViewController {
    view: View,
    scroll_resets: u64,

    exam_query: String,
    stream_filter: StreamFilter,
    selected_exam: Option<ExamRecord>,

    course_query: String,
    selected_skills: Vec<String>,
    selected_careers: Vec<String>,
    filter_panel_open: bool,

    iit_query: String,

    counselor_query: String,
    counselor_saved: bool,
    saved_roadmaps: Vec<SavedRoadmap>,
    selected_roadmap: Option<SavedRoadmap>,

    deep_info: AiSlot,
    exam_search: AiSlot,
    counselor: AiSlot,
}

impl ViewController {
    pub fn new(saved_roadmaps: Vec<SavedRoadmap>) -> Self {
        Self {
            saved_roadmaps,
            ..Self::default()
        }
    }

    pub fn view(&self) -> View {
        self.view
    }

    /// Incremented on every screen change; the renderer scrolls to the top when it moves.
    pub fn scroll_resets(&self) -> u64 {
        self.scroll_resets
    }

    /// Plain navigation. The detail screens need a selection and are entered through
    /// [`Self::open_exam`] / [`Self::open_roadmap`] instead.
    pub fn navigate(&mut self, view: View) -> Result<(), AppError> {
        match view {
            View::RoadmapDetail | View::ExamDetail => Err(AppError::MissingSelection {
                view: view.as_str(),
            }),
            _ => {
                self.switch_to(view);
                Ok(())
            }
        }
    }

    /// Show the detail screen of `exam`. Selecting a different exam clears the deep-info
    /// panel; returns `true` in that case.
    pub fn open_exam(&mut self, exam: ExamRecord) -> bool {
        let changed = self.selected_exam.as_ref().map(|e| &e.id) != Some(&exam.id);
        if changed {
            self.deep_info.reset();
        }
        self.selected_exam = Some(exam);
        self.switch_to(View::ExamDetail);
        changed
    }

    pub fn open_roadmap(&mut self, roadmap: SavedRoadmap) {
        self.selected_roadmap = Some(roadmap);
        self.switch_to(View::RoadmapDetail);
    }

    fn switch_to(&mut self, view: View) {
        if self.view != view {
            self.view = view;
            self.scroll_resets += 1;
        }
    }

    // --- exams ---

    /// Typing in the exam search box also clears any "Deep Search AI" result. Returns `true`
    /// if the query changed.
    pub fn set_exam_query(&mut self, query: &str) -> bool {
        if self.exam_query == query {
            return false;
        }
        self.exam_query = query.to_string();
        self.exam_search.reset();
        true
    }

    pub fn exam_query(&self) -> &str {
        &self.exam_query
    }

    pub fn set_stream_filter(&mut self, stream: StreamFilter) {
        self.stream_filter = stream;
    }

    pub fn stream_filter(&self) -> StreamFilter {
        self.stream_filter
    }

    pub fn filtered_exams<'a>(&self, catalog: &'a Catalog) -> Vec<&'a ExamRecord> {
        filter::filter_exams(catalog.exams(), &self.exam_query, self.stream_filter)
    }

    pub fn selected_exam(&self) -> Option<&ExamRecord> {
        self.selected_exam.as_ref()
    }

    /// Select `exam`, show its detail screen and start the deep-info request.
    pub fn begin_deep_info(&mut self, exam: ExamRecord) -> AiTicket {
        let prompt = Prompt::deep_info(&exam);
        self.open_exam(exam);
        self.deep_info.begin(AiChannel::DeepInfo, prompt)
    }

    /// Re-issue the deep-info request for the selected exam.
    pub fn retry_deep_info(&mut self) -> Option<AiTicket> {
        let prompt = self
            .deep_info
            .last_prompt
            .clone()
            .or_else(|| self.selected_exam.as_ref().map(Prompt::deep_info))?;
        Some(self.deep_info.begin(AiChannel::DeepInfo, prompt))
    }

    /// Start a "Deep Search AI" request for the current exam query. `None` if the query is blank.
    pub fn begin_exam_search(&mut self) -> Option<AiTicket> {
        if self.exam_query.trim().is_empty() {
            return None;
        }
        let prompt = Prompt::exam_search(&self.exam_query);
        Some(self.exam_search.begin(AiChannel::ExamSearch, prompt))
    }

    pub fn dismiss_exam_search(&mut self) {
        self.exam_search.reset();
    }

    // --- courses ---

    pub fn set_course_query(&mut self, query: &str) {
        self.course_query = query.to_string();
    }

    pub fn course_query(&self) -> &str {
        &self.course_query
    }

    pub fn toggle_skill(&mut self, skill: &str) {
        filter::toggle_tag(&mut self.selected_skills, skill);
    }

    pub fn toggle_career(&mut self, career: &str) {
        filter::toggle_tag(&mut self.selected_careers, career);
    }

    pub fn clear_course_filters(&mut self) {
        self.selected_skills.clear();
        self.selected_careers.clear();
    }

    pub fn selected_skills(&self) -> &[String] {
        &self.selected_skills
    }

    pub fn selected_careers(&self) -> &[String] {
        &self.selected_careers
    }

    pub fn active_filter_count(&self) -> usize {
        self.selected_skills.len() + self.selected_careers.len()
    }

    pub fn set_filter_panel_open(&mut self, open: bool) {
        self.filter_panel_open = open;
    }

    pub fn filter_panel_open(&self) -> bool {
        self.filter_panel_open
    }

    pub fn filtered_courses<'a>(&self, catalog: &'a Catalog) -> Vec<&'a CourseRecord> {
        filter::filter_courses(
            catalog.courses(),
            &self.course_query,
            &self.selected_skills,
            &self.selected_careers,
        )
    }

    // --- IIT guide ---

    pub fn set_iit_query(&mut self, query: &str) {
        self.iit_query = query.to_string();
    }

    pub fn iit_query(&self) -> &str {
        &self.iit_query
    }

    pub fn visible_iit_sections<'a>(&self, catalog: &'a Catalog) -> Vec<&'a IitSection> {
        filter::filter_iit_sections(catalog.iit_sections(), &self.iit_query)
    }

    // --- counselor and saved roadmaps ---

    /// Start a roadmap request. `None` if the question is blank.
    pub fn begin_counsel(&mut self, question: &str) -> Option<AiTicket> {
        if question.trim().is_empty() {
            return None;
        }
        self.counselor_query = question.to_string();
        self.counselor_saved = false;
        Some(
            self.counselor
                .begin(AiChannel::Counselor, Prompt::roadmap(question)),
        )
    }

    pub fn counselor_query(&self) -> &str {
        &self.counselor_query
    }

    pub fn counselor_saved(&self) -> bool {
        self.counselor_saved
    }

    /// The question and answer a save would record, if saving is currently allowed.
    pub fn saveable_roadmap(&self) -> Result<(String, AiResponse), String> {
        if self.counselor_saved {
            return Err("this roadmap is already saved".to_string());
        }
        if self.counselor.loading {
            return Err("the counselor is still answering".to_string());
        }
        let response = self
            .counselor
            .outcome
            .as_ref()
            .and_then(AiOutcome::response)
            .ok_or_else(|| "no successful counselor answer to save".to_string())?;
        Ok((self.counselor_query.clone(), response.clone()))
    }

    pub fn mark_counselor_saved(&mut self) {
        self.counselor_saved = true;
    }

    /// Replace the cached list. A selected roadmap that is no longer listed is dropped, and
    /// its detail screen falls back to home.
    pub fn set_saved_roadmaps(&mut self, roadmaps: Vec<SavedRoadmap>) {
        let stale = self
            .selected_roadmap
            .as_ref()
            .is_some_and(|r| !roadmaps.iter().any(|s| s.id == r.id));
        self.saved_roadmaps = roadmaps;
        if stale {
            self.selected_roadmap = None;
            if self.view == View::RoadmapDetail {
                self.switch_to(View::Home);
            }
        }
    }

    pub fn saved_roadmaps(&self) -> &[SavedRoadmap] {
        &self.saved_roadmaps
    }

    pub fn selected_roadmap(&self) -> Option<&SavedRoadmap> {
        self.selected_roadmap.as_ref()
    }

    // --- gateway results ---

    /// Commit `outcome` for `ticket`. Returns `false`, leaving state untouched, if a newer
    /// request on the same channel has started since.
    pub fn complete(&mut self, ticket: &AiTicket, outcome: AiOutcome) -> bool {
        self.slot_mut(ticket.channel).complete(ticket.generation, outcome)
    }

    pub fn slot(&self, channel: AiChannel) -> &AiSlot {
        match channel {
            AiChannel::DeepInfo => &self.deep_info,
            AiChannel::ExamSearch => &self.exam_search,
            AiChannel::Counselor => &self.counselor,
        }
    }

    fn slot_mut(&mut self, channel: AiChannel) -> &mut AiSlot {
        match channel {
            AiChannel::DeepInfo => &mut self.deep_info,
            AiChannel::ExamSearch => &mut self.exam_search,
            AiChannel::Counselor => &mut self.counselor,
        }
    }
}
