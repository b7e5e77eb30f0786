use std::collections::HashMap;
use std::sync::Arc;

use rmcp::{
    Json, ServerHandler,
    handler::server::router::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::*,
    tool, tool_handler, tool_router,
};
use tokio::sync::Mutex;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{info, warn};

use svadharma_common::roadmap::RoadmapStore;

use crate::api::{
    AiPanel, AiSearchExamsParams, AskCounselorParams, CourseFilterKind, ExamIdParams,
    ListCoursesParams, NavigateParams, RoadmapIdParams, RoadmapSummary, SaveRoadmapResponse,
    Screen, ScreenSnapshot, SearchExamsParams, SearchIitParams, ToggleCourseFilterParams,
};
use crate::catalog::Catalog;
use crate::counselor::AiGateway;
use crate::error::AppError;
use crate::model::{ExamRecord, StreamFilter, TopIit};
use crate::view::{AiChannel, AiTicket, View, ViewController};

/// One client session: its own View Controller over the shared catalog, store and gateway.
#[derive(Clone)]
pub struct SvadharmaServer {
    catalog: Arc<Catalog>,
    store: Arc<RoadmapStore>,
    gateway: Arc<dyn AiGateway>,
    session: Arc<Mutex<ViewController>>,
    /// Latest spawned gateway task per channel, with the generation it serves.
    inflight: Arc<Mutex<HashMap<AiChannel, (u64, AbortHandle)>>>,
    tool_router: ToolRouter<SvadharmaServer>,
}

impl SvadharmaServer {
    /// Start a session with the saved roadmaps currently in the store.
    pub async fn new(
        catalog: Arc<Catalog>,
        store: Arc<RoadmapStore>,
        gateway: Arc<dyn AiGateway>,
    ) -> Result<Self, AppError> {
        let saved = store.load().await?;
        Ok(Self {
            catalog,
            store,
            gateway,
            session: Arc::new(Mutex::new(ViewController::new(saved))),
            inflight: Arc::new(Mutex::new(HashMap::new())),
            tool_router: Self::tool_router(),
        })
    }

    /// Spawn the gateway request for `ticket`. Call while still holding the session lock
    /// that issued the ticket, so tasks are registered in generation order.
    ///
    /// The task commits its own outcome, so dropping the returned handle does not leave the
    /// slot loading. A newer request on the same channel aborts this one.
    async fn launch(&self, ticket: AiTicket) -> JoinHandle<Result<ScreenSnapshot, String>> {
        let channel = ticket.channel;
        let generation = ticket.generation;
        let server = self.clone();
        let task = tokio::spawn(async move {
            let outcome = server.gateway.ask(ticket.prompt.clone()).await;

            let mut session = server.session.lock().await;
            let committed = session.complete(&ticket, outcome);
            {
                let mut inflight = server.inflight.lock().await;
                if inflight
                    .get(&channel)
                    .is_some_and(|(current, _)| *current == generation)
                {
                    inflight.remove(&channel);
                }
            }

            if committed {
                info!(channel = ?channel, generation, "gateway result committed");
                Ok(server.snapshot(&session))
            } else {
                info!(channel = ?channel, generation, "discarding stale gateway result");
                Err(SUPERSEDED.to_string())
            }
        });

        let mut inflight = self.inflight.lock().await;
        match inflight.get(&channel) {
            Some((current, _)) if *current > generation => {
                info!(channel = ?channel, generation, newer = *current, "request already superseded");
                task.abort();
            }
            _ => {
                if let Some((previous, handle)) =
                    inflight.insert(channel, (generation, task.abort_handle()))
                {
                    info!(channel = ?channel, generation = previous, "aborting superseded request");
                    handle.abort();
                }
                info!(channel = ?channel, generation, "gateway request issued");
            }
        }
        task
    }

    /// Abort whatever is in flight on `channel`. The slot itself is reset by the caller.
    async fn cancel(&self, channel: AiChannel) {
        if let Some((generation, handle)) = self.inflight.lock().await.remove(&channel) {
            info!(channel = ?channel, generation, "cancelling request");
            handle.abort();
        }
    }

    fn snapshot(&self, vc: &ViewController) -> ScreenSnapshot {
        let catalog = &self.catalog;
        let screen = match vc.view() {
            View::Home => self.home_screen(vc),
            View::Exams => {
                let search = vc.slot(AiChannel::ExamSearch);
                Screen::Exams {
                    query: vc.exam_query().to_string(),
                    stream: vc.stream_filter().to_string(),
                    stream_choices: StreamFilter::CHOICES
                        .iter()
                        .map(|c| c.as_str().to_string())
                        .collect(),
                    exams: vc.filtered_exams(catalog).into_iter().cloned().collect(),
                    ai_search: AiPanel {
                        loading: search.loading,
                        outcome: search.outcome.clone(),
                    },
                }
            }
            View::Courses => Screen::Courses {
                query: vc.course_query().to_string(),
                filter_panel_open: vc.filter_panel_open(),
                skill_options: catalog.skill_options().to_vec(),
                career_options: catalog.career_options().to_vec(),
                selected_skills: vc.selected_skills().to_vec(),
                selected_careers: vc.selected_careers().to_vec(),
                active_filter_count: vc.active_filter_count(),
                courses: vc.filtered_courses(catalog).into_iter().cloned().collect(),
            },
            View::AiCounselor => {
                let answer = vc.slot(AiChannel::Counselor);
                Screen::AiCounselor {
                    query: vc.counselor_query().to_string(),
                    saved: vc.counselor_saved(),
                    answer: AiPanel {
                        loading: answer.loading,
                        outcome: answer.outcome.clone(),
                    },
                }
            }
            View::RoadmapDetail => match vc.selected_roadmap() {
                Some(roadmap) => Screen::RoadmapDetail {
                    roadmap: roadmap.clone(),
                },
                None => self.home_screen(vc),
            },
            View::ExamDetail => match vc.selected_exam() {
                Some(exam) => {
                    let deep = vc.slot(AiChannel::DeepInfo);
                    Screen::ExamDetail {
                        exam: exam.clone(),
                        deep_info: AiPanel {
                            loading: deep.loading,
                            outcome: deep.outcome.clone(),
                        },
                    }
                }
                None => self.home_screen(vc),
            },
            View::Iit => Screen::Iit {
                query: vc.iit_query().to_string(),
                top_iits: ranked(catalog.top_iits()),
                sections: vc.visible_iit_sections(catalog).into_iter().cloned().collect(),
            },
        };

        ScreenSnapshot {
            view: vc.view(),
            scroll_resets: vc.scroll_resets(),
            screen,
        }
    }

    fn home_screen(&self, vc: &ViewController) -> Screen {
        Screen::Home {
            exam_count: self.catalog.exams().len(),
            course_count: self.catalog.courses().len(),
            saved_roadmaps: vc.saved_roadmaps().iter().map(RoadmapSummary::from).collect(),
        }
    }

    fn find_exam(&self, exam_id: &str) -> Result<ExamRecord, String> {
        let exam_id = exam_id.trim();
        if exam_id.is_empty() {
            return Err("exam_id must not be empty".to_string());
        }
        self.catalog
            .exam(exam_id)
            .cloned()
            .ok_or_else(|| format!("exam not found: {exam_id}"))
    }
}

#[tool_router]
impl SvadharmaServer {
    #[tool(description = "Switch to a screen: home, exams, courses, ai-counselor or iit. Detail screens are opened with open_exam / open_roadmap.")]
    async fn navigate(
        &self,
        Parameters(params): Parameters<NavigateParams>,
    ) -> Result<Json<ScreenSnapshot>, String> {
        let view: View = params.view.parse()?;
        let mut session = self.session.lock().await;
        session.navigate(view).map_err(|e| e.to_string())?;
        Ok(Json(self.snapshot(&session)))
    }

    #[tool(description = "Return what the active screen currently shows.")]
    async fn get_screen(&self) -> Result<Json<ScreenSnapshot>, String> {
        let session = self.session.lock().await;
        Ok(Json(self.snapshot(&session)))
    }

    #[tool(description = "Filter the exam list by free text and stream (All, PCM, PCB, Science, Commerce, Humanities, Any). Changing the text clears any Deep Search AI result.")]
    async fn search_exams(
        &self,
        Parameters(params): Parameters<SearchExamsParams>,
    ) -> Result<Json<ScreenSnapshot>, String> {
        let stream = params
            .stream
            .as_deref()
            .map(str::parse::<StreamFilter>)
            .transpose()?;

        let mut session = self.session.lock().await;
        if let Some(stream) = stream {
            session.set_stream_filter(stream);
        }
        if let Some(query) = params.query.as_deref() {
            if session.set_exam_query(query) {
                self.cancel(AiChannel::ExamSearch).await;
            }
        }
        session.navigate(View::Exams).map_err(|e| e.to_string())?;
        Ok(Json(self.snapshot(&session)))
    }

    #[tool(description = "Open the detail screen of an exam (e.g. 'jee-main', 'neet') without querying live information.")]
    async fn open_exam(
        &self,
        Parameters(params): Parameters<ExamIdParams>,
    ) -> Result<Json<ScreenSnapshot>, String> {
        let exam = self.find_exam(&params.exam_id)?;
        let mut session = self.session.lock().await;
        if session.open_exam(exam) {
            self.cancel(AiChannel::DeepInfo).await;
        }
        Ok(Json(self.snapshot(&session)))
    }

    #[tool(description = "Open an exam and fetch live 2026-2027 dates, syllabus, fees and preparation strategy for it.")]
    async fn exam_deep_info(
        &self,
        Parameters(params): Parameters<ExamIdParams>,
    ) -> Result<Json<ScreenSnapshot>, String> {
        let exam = self.find_exam(&params.exam_id)?;
        info!(exam_id = %exam.id, "deep info requested");
        let task = {
            let mut session = self.session.lock().await;
            let ticket = session.begin_deep_info(exam);
            self.launch(ticket).await
        };
        finish(task).await
    }

    #[tool(description = "Repeat the last deep-info request for the selected exam.")]
    async fn retry_deep_info(&self) -> Result<Json<ScreenSnapshot>, String> {
        let task = {
            let mut session = self.session.lock().await;
            let ticket = session
                .retry_deep_info()
                .ok_or_else(|| "no exam selected".to_string())?;
            self.launch(ticket).await
        };
        finish(task).await
    }

    #[tool(description = "Deep Search AI: look up live exam notifications for the exam search text.")]
    async fn ai_search_exams(
        &self,
        Parameters(params): Parameters<AiSearchExamsParams>,
    ) -> Result<Json<ScreenSnapshot>, String> {
        let task = {
            let mut session = self.session.lock().await;
            if let Some(query) = params.query.as_deref() {
                session.set_exam_query(query);
            }
            session.navigate(View::Exams).map_err(|e| e.to_string())?;
            let ticket = session
                .begin_exam_search()
                .ok_or_else(|| "query must not be empty".to_string())?;
            info!(query = %ticket.prompt.contents, "exam search requested");
            self.launch(ticket).await
        };
        finish(task).await
    }

    #[tool(description = "Dismiss the Deep Search AI result on the exam list.")]
    async fn dismiss_ai_search(&self) -> Result<Json<ScreenSnapshot>, String> {
        let mut session = self.session.lock().await;
        session.dismiss_exam_search();
        self.cancel(AiChannel::ExamSearch).await;
        Ok(Json(self.snapshot(&session)))
    }

    #[tool(description = "Show the course explorer, optionally filtering by text and opening or closing the filter panel.")]
    async fn list_courses(
        &self,
        Parameters(params): Parameters<ListCoursesParams>,
    ) -> Result<Json<ScreenSnapshot>, String> {
        let mut session = self.session.lock().await;
        if let Some(query) = params.query.as_deref() {
            session.set_course_query(query);
        }
        if let Some(open) = params.filter_panel_open {
            session.set_filter_panel_open(open);
        }
        session.navigate(View::Courses).map_err(|e| e.to_string())?;
        Ok(Json(self.snapshot(&session)))
    }

    #[tool(description = "Select or deselect a skill or career chip in the course filter panel.")]
    async fn toggle_course_filter(
        &self,
        Parameters(params): Parameters<ToggleCourseFilterParams>,
    ) -> Result<Json<ScreenSnapshot>, String> {
        let (options, label) = match params.kind {
            CourseFilterKind::Skill => (self.catalog.skill_options(), "skill"),
            CourseFilterKind::Career => (self.catalog.career_options(), "career"),
        };
        let tag = options
            .iter()
            .find(|o| o.eq_ignore_ascii_case(params.tag.trim()))
            .ok_or_else(|| {
                format!(
                    "unknown {label}: '{}'. Available: {}",
                    params.tag.trim(),
                    options.join(", ")
                )
            })?;

        let mut session = self.session.lock().await;
        match params.kind {
            CourseFilterKind::Skill => session.toggle_skill(tag),
            CourseFilterKind::Career => session.toggle_career(tag),
        }
        session.navigate(View::Courses).map_err(|e| e.to_string())?;
        Ok(Json(self.snapshot(&session)))
    }

    #[tool(description = "Clear every selected skill and career chip.")]
    async fn clear_course_filters(&self) -> Result<Json<ScreenSnapshot>, String> {
        let mut session = self.session.lock().await;
        session.clear_course_filters();
        session.navigate(View::Courses).map_err(|e| e.to_string())?;
        Ok(Json(self.snapshot(&session)))
    }

    #[tool(description = "Search the IIT guide sections (e.g. 'design', 'pcm').")]
    async fn search_iit(
        &self,
        Parameters(params): Parameters<SearchIitParams>,
    ) -> Result<Json<ScreenSnapshot>, String> {
        let mut session = self.session.lock().await;
        session.set_iit_query(&params.query);
        session.navigate(View::Iit).map_err(|e| e.to_string())?;
        Ok(Json(self.snapshot(&session)))
    }

    #[tool(description = "Ask the AI career counselor for a step-by-step roadmap for the 2026-2027 cycle.")]
    async fn ask_counselor(
        &self,
        Parameters(params): Parameters<AskCounselorParams>,
    ) -> Result<Json<ScreenSnapshot>, String> {
        let task = {
            let mut session = self.session.lock().await;
            session.navigate(View::AiCounselor).map_err(|e| e.to_string())?;
            let ticket = session
                .begin_counsel(&params.query)
                .ok_or_else(|| "query must not be empty".to_string())?;
            info!(query = %params.query.trim(), "counselor question asked");
            self.launch(ticket).await
        };
        finish(task).await
    }

    #[tool(description = "Save the counselor's current answer as a roadmap. Each answer can be saved once.")]
    async fn save_roadmap(&self) -> Result<Json<SaveRoadmapResponse>, String> {
        let mut session = self.session.lock().await;
        let (query, response) = session.saveable_roadmap()?;

        let roadmap = self
            .store
            .save(&query, response)
            .await
            .map_err(|e| format!("save failed: {e}"))?;
        session.mark_counselor_saved();

        let roadmaps = self
            .store
            .load()
            .await
            .map_err(|e| format!("reload failed: {e}"))?;
        session.set_saved_roadmaps(roadmaps);

        Ok(Json(SaveRoadmapResponse {
            roadmap,
            screen: self.snapshot(&session),
        }))
    }

    #[tool(description = "Reload saved roadmaps and show them on the home screen.")]
    async fn list_roadmaps(&self) -> Result<Json<ScreenSnapshot>, String> {
        let roadmaps = self
            .store
            .load()
            .await
            .map_err(|e| format!("load failed: {e}"))?;
        let mut session = self.session.lock().await;
        session.set_saved_roadmaps(roadmaps);
        session.navigate(View::Home).map_err(|e| e.to_string())?;
        Ok(Json(self.snapshot(&session)))
    }

    #[tool(description = "Open a saved roadmap by ID.")]
    async fn open_roadmap(
        &self,
        Parameters(params): Parameters<RoadmapIdParams>,
    ) -> Result<Json<ScreenSnapshot>, String> {
        let roadmap_id = params.roadmap_id.trim().to_string();
        if roadmap_id.is_empty() {
            return Err("roadmap_id must not be empty".to_string());
        }

        let mut session = self.session.lock().await;
        let cached = session
            .saved_roadmaps()
            .iter()
            .find(|r| r.id == roadmap_id)
            .cloned();
        let roadmap = match cached {
            Some(roadmap) => roadmap,
            None => {
                let roadmaps = self
                    .store
                    .load()
                    .await
                    .map_err(|e| format!("load failed: {e}"))?;
                session.set_saved_roadmaps(roadmaps);
                session
                    .saved_roadmaps()
                    .iter()
                    .find(|r| r.id == roadmap_id)
                    .cloned()
                    .ok_or_else(|| format!("roadmap not found: {roadmap_id}"))?
            }
        };

        session.open_roadmap(roadmap);
        Ok(Json(self.snapshot(&session)))
    }

    #[tool(description = "Delete a saved roadmap by ID. Deleting an unknown ID changes nothing.")]
    async fn delete_roadmap(
        &self,
        Parameters(params): Parameters<RoadmapIdParams>,
    ) -> Result<Json<ScreenSnapshot>, String> {
        let roadmap_id = params.roadmap_id.trim().to_string();
        if roadmap_id.is_empty() {
            return Err("roadmap_id must not be empty".to_string());
        }

        let mut session = self.session.lock().await;
        let roadmaps = self
            .store
            .delete(&roadmap_id)
            .await
            .map_err(|e| format!("delete failed: {e}"))?;
        session.set_saved_roadmaps(roadmaps);
        Ok(Json(self.snapshot(&session)))
    }
}

const SUPERSEDED: &str = "request superseded by a newer one";

/// Wait for a launched request and turn its result into a tool result.
async fn finish(
    task: JoinHandle<Result<ScreenSnapshot, String>>,
) -> Result<Json<ScreenSnapshot>, String> {
    match task.await {
        Ok(result) => result.map(Json),
        Err(e) if e.is_cancelled() => Err(SUPERSEDED.to_string()),
        Err(e) => {
            warn!(error = %e, "gateway task failed");
            Err(format!("gateway task failed: {e}"))
        }
    }
}

/// Ranking rows in rank order.
fn ranked(top_iits: &[TopIit]) -> Vec<TopIit> {
    let mut rows = top_iits.to_vec();
    rows.sort_by_key(|r| r.rank);
    rows
}

#[tool_handler]
impl ServerHandler for SvadharmaServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_06_18,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "svadharma".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Svadharma career guide. Browse Indian undergraduate entrance exams with \
                 search_exams, explore degree programs with list_courses and \
                 toggle_course_filter, and read the IIT guide with search_iit. \
                 exam_deep_info and ai_search_exams fetch live 2026-2027 information, \
                 ask_counselor builds a career roadmap that save_roadmap keeps for later. \
                 Every tool returns a snapshot of the active screen."
                    .to_string(),
            ),
        }
    }
}
