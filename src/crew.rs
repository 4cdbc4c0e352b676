//! The crew manager: intent routing and the typed stage pipeline.
//!
//! Every handled Slack message runs one chain of [`Stage`]s chosen by
//! [`Intent::classify`]. A stage consumes the previous [`StageOutput`] and
//! produces the next one; the last stage of every chain yields
//! [`StageOutput::Reply`], which is then posted back to the thread.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::agents::base_agent::BaseAgent;
use crate::agents::content_agent::ContentAgent;
use crate::agents::memory_agent::MemoryAgent;
use crate::agents::response_agent::ResponseAgent;
use crate::agents::slack_agent::SlackAgent;
use crate::agents::todo_agent::{TodoAgent, TodoCommand};
use crate::crews::crew_output::CrewOutput;
use crate::llms::base_llm::LLMMessage;
use crate::memory::records::{SummaryFormat, DEFAULT_SUMMARY_WORDS};
use crate::settings::DEFAULT_MAX_MESSAGE_HISTORY;
use crate::services::slack::events::{InboundMessage, Origin, ReactionAddedEvent, SlackEvent};
use crate::task::Task;
use crate::tasks::task_output::TaskOutput;
use crate::tasks::{assistant_tasks, memory_tasks, response_tasks, slack_tasks};
use crate::utilities::errors::{ServiceError, ServiceResult};
use crate::utilities::metrics::Metrics;
use crate::utilities::text_processing::extract_urls;

pub const APOLOGY: &str = "I encountered an error while processing your request. Please try again later.";

const NICKNAME_PREFIXES: [&str; 5] = ["call me", "my name is", "my nickname is", "name:", "nickname:"];
const SUMMARY_KEYWORDS: [&str; 4] = ["summarize", "summary", "tldr", "tl;dr"];
const MEMORY_QUERY_PHRASES: [&str; 4] = [
    "what do you know about me",
    "what do you remember",
    "my preferences",
    "my memory",
];

/// What the user is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Nickname,
    Summarize,
    Todo,
    MemoryWrite,
    MemoryQuery,
    Question,
}

impl Intent {
    /// First matching rule wins.
    pub fn classify(text: &str) -> Intent {
        let lower = text.trim().to_lowercase();

        if NICKNAME_PREFIXES.iter().any(|p| lower.starts_with(p)) {
            return Intent::Nickname;
        }
        if SUMMARY_KEYWORDS.iter().any(|k| lower.contains(k)) && !extract_urls(text).is_empty() {
            return Intent::Summarize;
        }
        if TodoCommand::matches(text) {
            return Intent::Todo;
        }
        if MemoryAgent::extract_fact(text).is_some() {
            return Intent::MemoryWrite;
        }
        if MEMORY_QUERY_PHRASES.iter().any(|p| lower.contains(p)) {
            return Intent::MemoryQuery;
        }
        Intent::Question
    }

    /// Stage kinds run for this intent, in order.
    pub fn chain(self) -> Vec<StageKind> {
        let terminal = match self {
            Intent::Question => {
                return vec![
                    StageKind::ProcessMention,
                    StageKind::FetchContext,
                    StageKind::FetchUserContext,
                    StageKind::GenerateResponse,
                ]
            }
            Intent::Nickname => StageKind::HandleNickname,
            Intent::Summarize => StageKind::SummarizeContent,
            Intent::Todo => StageKind::ManageTodos,
            Intent::MemoryWrite => StageKind::WriteMemory,
            Intent::MemoryQuery => StageKind::QueryMemory,
        };
        vec![StageKind::ProcessMention, terminal]
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Intent::Nickname => "nickname",
            Intent::Summarize => "summarize",
            Intent::Todo => "todo",
            Intent::MemoryWrite => "memory_write",
            Intent::MemoryQuery => "memory_query",
            Intent::Question => "question",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    ProcessMention,
    FetchContext,
    FetchUserContext,
    GenerateResponse,
    HandleNickname,
    SummarizeContent,
    ManageTodos,
    WriteMemory,
    QueryMemory,
}

/// Value passed from one stage to the next.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutput {
    Mention {
        message: InboundMessage,
        prompt: String,
    },
    Context {
        message: InboundMessage,
        prompt: String,
        history: Vec<LLMMessage>,
    },
    UserContext {
        message: InboundMessage,
        prompt: String,
        history: Vec<LLMMessage>,
        user_context: String,
    },
    Reply(String),
}

impl StageOutput {
    fn variant(&self) -> &'static str {
        match self {
            StageOutput::Mention { .. } => "Mention",
            StageOutput::Context { .. } => "Context",
            StageOutput::UserContext { .. } => "UserContext",
            StageOutput::Reply(_) => "Reply",
        }
    }

    /// Short text recorded as the stage's task output.
    fn describe(&self) -> String {
        match self {
            StageOutput::Mention { prompt, .. } => prompt.clone(),
            StageOutput::Context { history, .. } => format!("{} messages of history", history.len()),
            StageOutput::UserContext { user_context, .. } => user_context.clone(),
            StageOutput::Reply(reply) => reply.clone(),
        }
    }
}

/// One step of a chain: what runs, and the task that describes it.
#[derive(Debug, Clone)]
pub struct Stage {
    pub kind: StageKind,
    pub task: Task,
}

pub struct CrewManager {
    slack_agent: SlackAgent,
    memory_agent: MemoryAgent,
    response_agent: ResponseAgent,
    content_agent: Arc<ContentAgent>,
    todo_agent: TodoAgent,
    metrics: Arc<Metrics>,
    verbose: bool,
    /// Most recent Slack messages kept as history for a reply.
    max_message_history: usize,
}

impl fmt::Debug for CrewManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrewManager")
            .field("verbose", &self.verbose)
            .finish_non_exhaustive()
    }
}

impl CrewManager {
    pub fn new(
        slack_agent: SlackAgent,
        memory_agent: MemoryAgent,
        response_agent: ResponseAgent,
        content_agent: Arc<ContentAgent>,
        todo_agent: TodoAgent,
        metrics: Arc<Metrics>,
        verbose: bool,
    ) -> Self {
        log::info!(
            "Crew initialized with agents: {}, {}, {}, {}, {}",
            slack_agent.name(),
            memory_agent.name(),
            response_agent.name(),
            content_agent.name(),
            todo_agent.name()
        );
        Self {
            slack_agent,
            memory_agent,
            response_agent,
            content_agent,
            todo_agent,
            metrics,
            verbose,
            max_message_history: DEFAULT_MAX_MESSAGE_HISTORY,
        }
    }

    pub fn with_max_message_history(mut self, max_message_history: usize) -> Self {
        self.max_message_history = max_message_history;
        self
    }

    pub fn slack_agent(&self) -> &SlackAgent {
        &self.slack_agent
    }

    pub fn response_agent(&self) -> &ResponseAgent {
        &self.response_agent
    }

    pub fn content_agent(&self) -> &Arc<ContentAgent> {
        &self.content_agent
    }

    fn agent_for(&self, kind: StageKind) -> &dyn BaseAgent {
        match kind {
            StageKind::ProcessMention | StageKind::FetchContext => &self.slack_agent,
            StageKind::FetchUserContext
            | StageKind::HandleNickname
            | StageKind::WriteMemory
            | StageKind::QueryMemory => &self.memory_agent,
            StageKind::GenerateResponse => &self.response_agent,
            StageKind::SummarizeContent => self.content_agent.as_ref(),
            StageKind::ManageTodos => &self.todo_agent,
        }
    }

    fn role_of(&self, kind: StageKind) -> &str {
        self.agent_for(kind).role()
    }

    /// Build the stages for `intent`, each with its interpolated task.
    pub fn build_chain(&self, intent: Intent, inputs: &HashMap<String, String>) -> Vec<Stage> {
        intent
            .chain()
            .into_iter()
            .map(|kind| {
                let role = self.role_of(kind);
                let mut task = match kind {
                    StageKind::ProcessMention => slack_tasks::process_mention(role),
                    StageKind::FetchContext => slack_tasks::fetch_context(role),
                    StageKind::FetchUserContext => memory_tasks::fetch_user_context(role),
                    StageKind::GenerateResponse => response_tasks::generate_response(role),
                    StageKind::HandleNickname => memory_tasks::store_nickname(role),
                    StageKind::SummarizeContent => assistant_tasks::summarize_content(role),
                    StageKind::ManageTodos => assistant_tasks::manage_todos(role),
                    StageKind::WriteMemory => assistant_tasks::write_memory(role),
                    StageKind::QueryMemory => assistant_tasks::query_memory(role),
                };
                task.interpolate_inputs(inputs);
                Stage { kind, task }
            })
            .collect()
    }

    /// Entry point for Slack events delivered to the webhook.
    ///
    /// Errors never escape: they are logged and answered with [`APOLOGY`]
    /// in the message's thread.
    pub async fn handle_event(&self, event: SlackEvent) {
        let bot_user_id = match self.slack_agent.bot_user_id().await {
            Ok(id) => id,
            Err(e) => {
                log::error!("Cannot handle Slack event without the bot user id: {}", e);
                self.metrics.track_error(e.kind());
                return;
            }
        };

        if let SlackEvent::ReactionAdded(ref reaction) = event {
            self.log_reaction(reaction, &bot_user_id);
            return;
        }

        let Some((message, origin)) = event.to_inbound(&bot_user_id) else {
            log::debug!("Ignoring Slack event");
            return;
        };

        if origin == Origin::ThreadReply {
            let thread_ts = message.thread_ts.as_deref().unwrap_or(&message.ts);
            if !self.slack_agent.has_replied_in_thread(&message.channel, thread_ts) {
                log::debug!("Bot has not replied in thread {}, ignoring reply", thread_ts);
                return;
            }
        }

        if let Err(e) = self.process_message(message.clone()).await {
            log::error!("Error processing message from {} in {}: {}", message.user, message.channel, e);
            self.metrics.track_error(e.kind());
            if let Err(post_err) = self
                .slack_agent
                .send_message(&message.channel, APOLOGY, Some(message.reply_thread_ts()))
                .await
            {
                log::error!("Could not post the error reply: {}", post_err);
            }
        }
    }

    fn log_reaction(&self, reaction: &ReactionAddedEvent, bot_user_id: &str) {
        if reaction.item_user.as_deref() == Some(bot_user_id) {
            log::info!(
                "Reaction :{}: added to a bot message by {} (channel {:?}, ts {:?})",
                reaction.reaction,
                reaction.user,
                reaction.item.channel,
                reaction.item.ts
            );
        }
    }

    /// Run the chain for one message and post the reply to its thread.
    pub async fn process_message(&self, message: InboundMessage) -> ServiceResult<CrewOutput> {
        let _timer = self.metrics.timer("crew.process_message");
        let usage_before = self.response_agent.llm().get_token_usage_summary();

        let intent = Intent::classify(&message.text);
        log::info!("Handling {} message from {} in {}", intent, message.user, message.channel);

        let mut inputs = HashMap::new();
        inputs.insert("user_id".to_string(), message.user.clone());
        if let Some(url) = extract_urls(&message.text).into_iter().next() {
            inputs.insert("url".to_string(), url);
        }
        inputs.insert("max_words".to_string(), DEFAULT_SUMMARY_WORDS.to_string());

        let mut stages = self.build_chain(intent, &inputs);
        let mut state = StageOutput::Mention {
            prompt: message.text.clone(),
            message: message.clone(),
        };
        let mut outputs: Vec<TaskOutput> = Vec::with_capacity(stages.len() + 1);

        for stage in &mut stages {
            let agent = self.agent_for(stage.kind);
            if self.verbose || agent.verbose() {
                log::info!("[{}] {}", agent.name(), stage.task.prompt());
            }
            stage.task.mark_started();
            state = match self.run_stage(stage.kind, state).await {
                Ok(next) => next,
                Err(e) => {
                    self.metrics.track_error(&stage.task.name);
                    return Err(e);
                }
            };
            outputs.push(stage.task.complete(state.describe()).clone());
        }

        let reply = match state {
            StageOutput::Reply(reply) => reply,
            other => {
                return Err(ServiceError::internal(format!(
                    "{} chain ended with {} instead of a reply",
                    intent,
                    other.variant()
                )))
            }
        };

        let mut send = slack_tasks::send_response(self.slack_agent.role());
        send.mark_started();
        self.slack_agent
            .send_message(&message.channel, &reply, Some(message.reply_thread_ts()))
            .await?;
        outputs.push(send.complete(reply.clone()).clone());
        self.slack_agent.update_channel_stats(&message.channel, &message.user);

        let usage = self
            .response_agent
            .llm()
            .get_token_usage_summary()
            .since(&usage_before);
        Ok(CrewOutput::new(reply, outputs, usage))
    }

    async fn run_stage(&self, kind: StageKind, input: StageOutput) -> ServiceResult<StageOutput> {
        match (kind, input) {
            (StageKind::ProcessMention, StageOutput::Mention { message, prompt }) => {
                self.slack_agent.acknowledge(&message).await;
                let prompt = self.slack_agent.clean_prompt_text(&prompt);
                Ok(StageOutput::Mention { message, prompt })
            }
            (StageKind::FetchContext, StageOutput::Mention { message, prompt }) => {
                let _timer = self.metrics.timer("crew.fetch_context");
                let bot_user_id = self.slack_agent.bot_user_id().await?;
                let mut conversation = self.slack_agent.fetch_conversation(&message).await?;
                // the prompt itself is appended last by the response agent
                conversation.retain(|m| m.ts != message.ts);
                if conversation.len() > self.max_message_history {
                    let excess = conversation.len() - self.max_message_history;
                    conversation.drain(..excess);
                }
                let names = self.slack_agent.display_names_for(&conversation).await;
                let history = self
                    .response_agent
                    .format_conversation(&conversation, &names, &bot_user_id);
                Ok(StageOutput::Context { message, prompt, history })
            }
            (StageKind::FetchUserContext, StageOutput::Context { message, prompt, history }) => {
                let display_name = self.slack_agent.get_user_display_name(&message.user).await;
                let user_context = self
                    .memory_agent
                    .fetch_user_context(&message.user, &display_name)
                    .await?;
                Ok(StageOutput::UserContext {
                    message,
                    prompt,
                    history,
                    user_context,
                })
            }
            (
                StageKind::GenerateResponse,
                StageOutput::UserContext {
                    prompt,
                    history,
                    user_context,
                    ..
                },
            ) => {
                let _timer = self.metrics.timer("crew.generate_response");
                let reply = self
                    .response_agent
                    .generate_response(&prompt, history, Some(&user_context), None)
                    .await?;
                Ok(StageOutput::Reply(reply))
            }
            (StageKind::HandleNickname, StageOutput::Mention { message, prompt }) => {
                let display_name = self.slack_agent.get_user_display_name(&message.user).await;
                let reply = self
                    .memory_agent
                    .handle_nickname_command(&prompt, &message.user, Some(&display_name))
                    .await?;
                Ok(StageOutput::Reply(reply))
            }
            (StageKind::SummarizeContent, StageOutput::Mention { message, prompt }) => {
                let _timer = self.metrics.timer("crew.summarize_content");
                let Some(url) = self.content_agent.extract_urls_from_text(&prompt).into_iter().next() else {
                    return Err(ServiceError::validation("no link to summarize"));
                };
                let summary = self
                    .content_agent
                    .summarize(&url, DEFAULT_SUMMARY_WORDS, SummaryFormat::Markdown)
                    .await?;
                let reply = summary.to_slack_text();
                self.memory_agent
                    .store()
                    .create_summary(summary.into_new_summary(&message.user))
                    .await?;
                Ok(StageOutput::Reply(reply))
            }
            (StageKind::ManageTodos, StageOutput::Mention { message, prompt }) => Ok(StageOutput::Reply(
                self.todo_agent.handle_todo_command(&prompt, &message.user).await?,
            )),
            (StageKind::WriteMemory, StageOutput::Mention { message, prompt }) => Ok(StageOutput::Reply(
                self.memory_agent.remember(&prompt, &message.user).await?,
            )),
            (StageKind::QueryMemory, StageOutput::Mention { message, .. }) => {
                let display_name = self.slack_agent.get_user_display_name(&message.user).await;
                Ok(StageOutput::Reply(
                    self.memory_agent.describe_memory(&message.user, &display_name).await?,
                ))
            }
            (kind, input) => Err(ServiceError::internal(format!(
                "stage {:?} cannot consume {}",
                kind,
                input.variant()
            ))),
        }
    }
}
