use crate::core::error::{GenerationError, WorkflowError};
use crate::core::state::{Analysis, Idea, Script, Stage, WorkflowState};
use crate::services::generator::Generator;

/// Input for one generation call, captured when the call is started.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Analyze { source_text: String },
    Ideate { analysis: Analysis, source_text: String },
    Script { idea: Idea, analysis: Analysis },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Analysis(Analysis),
    Ideas(Vec<Idea>),
    Script(Script),
}

/// A started call. The ticket must be handed back to [`Workflow::finish`].
#[derive(Debug, Clone, PartialEq)]
pub struct PendingCall {
    pub ticket: u64,
    pub request: Request,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Moved forward to a new stable stage.
    Advanced(Stage),
    /// Script regenerated for another idea without leaving the script stage.
    Replaced,
    /// Call failed; the workflow is back at (or still in) this stable stage.
    RolledBack(Stage),
    /// The call was superseded or invalidated by a reset; its result was dropped.
    Stale,
}

#[derive(Debug)]
struct InFlight {
    ticket: u64,
    busy_stage: Stage,
    idea: Option<Idea>,
}

/// Four-stage state machine over the accumulated artifacts.
///
/// Every transition is split in two: a `begin_*` call checks the stage, marks the
/// workflow busy and returns the request to run; [`Workflow::finish`] applies the
/// result. Only the most recently started call may finish; anything else is stale.
#[derive(Debug, Default)]
pub struct Workflow {
    state: WorkflowState,
    in_flight: Option<InFlight>,
    last_ticket: u64,
    notice: Option<String>,
}

impl Workflow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current stage, including the transient busy stages.
    pub fn stage(&self) -> Stage {
        self.in_flight
            .as_ref()
            .map(|f| f.busy_stage)
            .unwrap_or(self.state.stage)
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn source_text(&self) -> &str {
        &self.state.source_text
    }

    pub fn analysis(&self) -> Option<&Analysis> {
        self.state.analysis.as_ref()
    }

    pub fn ideas(&self) -> &[Idea] {
        &self.state.ideas
    }

    pub fn selected_idea(&self) -> Option<&Idea> {
        self.state.selected_idea.as_ref()
    }

    pub fn script(&self) -> Option<&Script> {
        self.state.script.as_ref()
    }

    /// Message describing the most recent failed call.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn begin_submit(&mut self, source_text: &str) -> Result<PendingCall, WorkflowError> {
        self.expect_stage(Stage::Input, "submit")?;
        if source_text.trim().is_empty() {
            return Err(WorkflowError::EmptySource);
        }
        self.state.source_text = source_text.to_string();
        let request = Request::Analyze {
            source_text: self.state.source_text.clone(),
        };
        Ok(self.start(Stage::Analyzing, None, request))
    }

    pub fn begin_proceed(&mut self) -> Result<PendingCall, WorkflowError> {
        self.expect_stage(Stage::AnalysisReady, "generate ideas")?;
        let analysis = self.required_analysis("generate ideas")?;
        let request = Request::Ideate {
            analysis,
            source_text: self.state.source_text.clone(),
        };
        Ok(self.start(Stage::Ideating, None, request))
    }

    pub fn begin_choose(&mut self, index: usize) -> Result<PendingCall, WorkflowError> {
        self.expect_stage(Stage::IdeasReady, "choose an idea")?;
        self.start_script(index, Stage::Scripting)
    }

    /// Regenerates the script for a different idea while staying on the script stage.
    pub fn begin_choose_other(&mut self, index: usize) -> Result<PendingCall, WorkflowError> {
        self.expect_stage(Stage::ScriptReady, "choose another idea")?;
        self.start_script(index, Stage::ScriptReady)
    }

    pub fn finish(
        &mut self,
        ticket: u64,
        result: Result<Response, GenerationError>,
    ) -> Transition {
        let in_flight = match self.in_flight.take() {
            Some(f) if f.ticket == ticket => f,
            other => {
                self.in_flight = other;
                log::debug!("Dropping stale result for call #{}", ticket);
                return Transition::Stale;
            }
        };

        let response = match result {
            Ok(response) => response,
            Err(e) => return self.roll_back(in_flight.busy_stage, e.to_string()),
        };

        match (in_flight.busy_stage, response) {
            (Stage::Analyzing, Response::Analysis(analysis)) => {
                self.state.analysis = Some(analysis);
                self.advance(Stage::AnalysisReady)
            }
            (Stage::Ideating, Response::Ideas(ideas)) => {
                self.state.ideas = ideas;
                self.advance(Stage::IdeasReady)
            }
            (Stage::Scripting, Response::Script(script)) => {
                self.state.selected_idea = in_flight.idea;
                self.state.script = Some(script);
                self.advance(Stage::ScriptReady)
            }
            (Stage::ScriptReady, Response::Script(script)) => {
                self.state.selected_idea = in_flight.idea;
                self.state.script = Some(script);
                log::info!("Script replaced");
                Transition::Replaced
            }
            (busy, response) => self.roll_back(
                busy,
                format!("unexpected {} response while {}", response_kind(&response), busy),
            ),
        }
    }

    /// Discards every artifact and returns to input, but only if `confirm` agrees.
    /// Any call still in flight becomes stale.
    pub fn reset<F: FnOnce() -> bool>(&mut self, confirm: F) -> bool {
        if !confirm() {
            return false;
        }
        self.state = WorkflowState::default();
        self.in_flight = None;
        self.notice = None;
        log::info!("Workflow reset");
        true
    }

    fn start(&mut self, busy_stage: Stage, idea: Option<Idea>, request: Request) -> PendingCall {
        self.last_ticket += 1;
        self.notice = None;
        self.in_flight = Some(InFlight {
            ticket: self.last_ticket,
            busy_stage,
            idea,
        });
        log::info!("Call #{} started ({})", self.last_ticket, busy_stage);
        PendingCall {
            ticket: self.last_ticket,
            request,
        }
    }

    fn start_script(&mut self, index: usize, busy_stage: Stage) -> Result<PendingCall, WorkflowError> {
        let analysis = self.required_analysis("write a script")?;
        let idea = self
            .state
            .ideas
            .get(index)
            .cloned()
            .ok_or(WorkflowError::NoSuchIdea(index))?;
        let request = Request::Script {
            idea: idea.clone(),
            analysis,
        };
        Ok(self.start(busy_stage, Some(idea), request))
    }

    fn expect_stage(&self, expected: Stage, action: &'static str) -> Result<(), WorkflowError> {
        if self.is_busy() {
            return Err(WorkflowError::Busy);
        }
        if self.state.stage != expected {
            return Err(WorkflowError::InvalidTransition {
                stage: self.state.stage,
                action,
            });
        }
        Ok(())
    }

    fn required_analysis(&self, action: &'static str) -> Result<Analysis, WorkflowError> {
        self.state
            .analysis
            .clone()
            .ok_or(WorkflowError::InvalidTransition {
                stage: self.state.stage,
                action,
            })
    }

    fn advance(&mut self, stage: Stage) -> Transition {
        log::info!("Stage {} -> {}", self.state.stage, stage);
        self.state.stage = stage;
        Transition::Advanced(stage)
    }

    fn roll_back(&mut self, busy_stage: Stage, message: String) -> Transition {
        log::warn!("{} failed, staying at {}: {}", busy_stage, self.state.stage, message);
        self.notice = Some(message);
        Transition::RolledBack(self.state.stage)
    }
}

fn response_kind(response: &Response) -> &'static str {
    match response {
        Response::Analysis(_) => "analysis",
        Response::Ideas(_) => "ideas",
        Response::Script(_) => "script",
    }
}

pub async fn dispatch(generator: &Generator, request: &Request) -> Result<Response, GenerationError> {
    match request {
        Request::Analyze { source_text } => generator.analyze(source_text).await.map(Response::Analysis),
        Request::Ideate {
            analysis,
            source_text,
        } => generator
            .ideate(analysis, source_text)
            .await
            .map(Response::Ideas),
        Request::Script { idea, analysis } => {
            generator.script(idea, analysis).await.map(Response::Script)
        }
    }
}

/// Drives a [`Workflow`] with a [`Generator`], one call at a time.
pub struct WorkflowManager {
    workflow: Workflow,
    generator: Generator,
}

impl WorkflowManager {
    pub fn new(generator: Generator) -> Self {
        Self {
            workflow: Workflow::new(),
            generator,
        }
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    pub fn generator(&self) -> &Generator {
        &self.generator
    }

    pub async fn submit(&mut self, source_text: &str) -> Result<Transition, WorkflowError> {
        let call = self.workflow.begin_submit(source_text)?;
        Ok(self.run(call).await)
    }

    pub async fn proceed(&mut self) -> Result<Transition, WorkflowError> {
        let call = self.workflow.begin_proceed()?;
        Ok(self.run(call).await)
    }

    pub async fn choose(&mut self, index: usize) -> Result<Transition, WorkflowError> {
        let call = self.workflow.begin_choose(index)?;
        Ok(self.run(call).await)
    }

    pub async fn choose_other(&mut self, index: usize) -> Result<Transition, WorkflowError> {
        let call = self.workflow.begin_choose_other(index)?;
        Ok(self.run(call).await)
    }

    pub fn reset<F: FnOnce() -> bool>(&mut self, confirm: F) -> bool {
        self.workflow.reset(confirm)
    }

    async fn run(&mut self, call: PendingCall) -> Transition {
        let result = dispatch(&self.generator, &call.request).await;
        self.workflow.finish(call.ticket, result)
    }
}
