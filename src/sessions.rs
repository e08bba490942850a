use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use uuid::Uuid;

use crate::config::QuizConfig;
use crate::content::QuizLoader;
use crate::error::{LoadError, SessionError};
use crate::game_logic::{Progress, QuestionCount, QuizSession, Rank, SessionSnapshot};
use crate::ranks::RankStore;

const MAX_SWEEP_PERIOD: Duration = Duration::from_secs(60);

type Reply<T> = oneshot::Sender<Result<T, SessionError>>;

#[derive(Debug)]
pub enum SessionManagerMessage {
    Register {
        session: Box<QuizSession>,
        respond_to: Reply<SessionSnapshot>,
    },
    Snapshot {
        session_id: Uuid,
        respond_to: Reply<SessionSnapshot>,
    },
    SelectOption {
        session_id: Uuid,
        option: String,
        respond_to: Reply<SessionSnapshot>,
    },
    Submit {
        session_id: Uuid,
        option: Option<String>,
        respond_to: Reply<SessionSnapshot>,
    },
    Advance {
        session_id: Uuid,
        respond_to: Reply<SessionSnapshot>,
    },
    Close {
        session_id: Uuid,
        respond_to: Reply<()>,
    },
}

struct TrackedSession {
    session: QuizSession,
    last_activity: Instant,
}

pub struct SessionManagerActor {
    receiver: mpsc::Receiver<SessionManagerMessage>,
    sessions: HashMap<Uuid, TrackedSession>,
    idle_timeout: Duration,
}

impl SessionManagerActor {
    fn new(receiver: mpsc::Receiver<SessionManagerMessage>, idle_timeout: Duration) -> Self {
        SessionManagerActor {
            receiver,
            sessions: HashMap::new(),
            idle_timeout,
        }
    }

    /// Looks up a session and marks it as active.
    fn session_mut(&mut self, session_id: Uuid) -> Result<&mut QuizSession, SessionError> {
        let tracked = self
            .sessions
            .get_mut(&session_id)
            .ok_or(SessionError::NotFound(session_id))?;
        tracked.last_activity = Instant::now();
        Ok(&mut tracked.session)
    }

    #[tracing::instrument(skip(self, msg), fields(
        msg_type = %std::any::type_name_of_val(&msg)
    ))]
    fn handle_message(&mut self, msg: SessionManagerMessage) {
        match msg {
            SessionManagerMessage::Register {
                session,
                respond_to,
            } => {
                let snapshot = session.snapshot();
                tracing::info!(
                    session.id = %session.id(),
                    quiz.id = %session.quiz_id(),
                    questions.count = session.total(),
                    "Quiz session started"
                );
                self.sessions.insert(
                    session.id(),
                    TrackedSession {
                        session: *session,
                        last_activity: Instant::now(),
                    },
                );
                let _ = respond_to.send(Ok(snapshot));
            }
            SessionManagerMessage::Snapshot {
                session_id,
                respond_to,
            } => {
                let result = self.session_mut(session_id).map(|session| session.snapshot());
                let _ = respond_to.send(result);
            }
            SessionManagerMessage::SelectOption {
                session_id,
                option,
                respond_to,
            } => {
                let result = self.session_mut(session_id).and_then(|session| {
                    session.select_option(&option)?;
                    Ok(session.snapshot())
                });
                let _ = respond_to.send(result);
            }
            SessionManagerMessage::Submit {
                session_id,
                option,
                respond_to,
            } => {
                let result = self.session_mut(session_id).and_then(|session| {
                    session.submit_option(option.as_deref())?;
                    Ok(session.snapshot())
                });
                let _ = respond_to.send(result);
            }
            SessionManagerMessage::Advance {
                session_id,
                respond_to,
            } => {
                let result = self.handle_advance(session_id);
                let _ = respond_to.send(result);
            }
            SessionManagerMessage::Close {
                session_id,
                respond_to,
            } => {
                let result = match self.sessions.remove(&session_id) {
                    Some(_) => {
                        tracing::info!(session.id = %session_id, "Quiz session closed");
                        Ok(())
                    }
                    None => Err(SessionError::NotFound(session_id)),
                };
                let _ = respond_to.send(result);
            }
        }
    }

    fn handle_advance(&mut self, session_id: Uuid) -> Result<SessionSnapshot, SessionError> {
        let session = self.session_mut(session_id)?;

        match session.advance()? {
            Progress::Next { index } => {
                tracing::debug!(
                    session.id = %session_id,
                    question.index = index,
                    "Advanced to next question"
                );
            }
            Progress::Finished(result) => {
                tracing::info!(
                    session.id = %session_id,
                    quiz.id = %session.quiz_id(),
                    correct = result.correct_count,
                    total = result.total,
                    rank = %result.rank,
                    "Quiz session finished"
                );
            }
        }

        Ok(session.snapshot())
    }

    /// Drops every session, finished or not, that has seen no command for `idle_timeout`.
    fn evict_idle_sessions(&mut self) {
        let now = Instant::now();
        let idle_timeout = self.idle_timeout;
        let before = self.sessions.len();

        self.sessions.retain(|session_id, tracked| {
            let keep = now.duration_since(tracked.last_activity) < idle_timeout;
            if !keep {
                tracing::info!(
                    session.id = %session_id,
                    quiz.id = %tracked.session.quiz_id(),
                    session.phase = ?tracked.session.phase(),
                    "Quiz session evicted after inactivity"
                );
            }
            keep
        });

        let evicted = before - self.sessions.len();
        if evicted > 0 {
            tracing::debug!(
                sessions.evicted = evicted,
                sessions.remaining = self.sessions.len(),
                "Idle session sweep finished"
            );
        }
    }
}

#[tracing::instrument(skip(actor), fields(idle_timeout_secs = actor.idle_timeout.as_secs()))]
pub async fn run_session_manager_actor(mut actor: SessionManagerActor) {
    tracing::info!("SessionManager actor started");

    let sweep_period = (actor.idle_timeout / 2).clamp(Duration::from_secs(1), MAX_SWEEP_PERIOD);
    let mut sweep = tokio::time::interval_at(Instant::now() + sweep_period, sweep_period);
    sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            maybe_msg = actor.receiver.recv() => {
                match maybe_msg {
                    Some(msg) => actor.handle_message(msg),
                    None => {
                        tracing::info!("SessionManager channel closed. Shutting down");
                        break;
                    }
                }
            }
            _ = sweep.tick() => actor.evict_idle_sessions(),
        }
    }

    tracing::info!("SessionManager actor stopped");
}

#[derive(Clone)]
pub struct SessionManagerHandle {
    sender: mpsc::Sender<SessionManagerMessage>,
    loader: Arc<QuizLoader>,
    rank_store: Arc<dyn RankStore>,
    quiz_config: Arc<QuizConfig>,
}

impl SessionManagerHandle {
    pub fn spawn(
        buffer_size: usize,
        loader: Arc<QuizLoader>,
        rank_store: Arc<dyn RankStore>,
        quiz_config: QuizConfig,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let idle_timeout = Duration::from_secs(quiz_config.session_idle_secs);
        let actor = SessionManagerActor::new(receiver, idle_timeout);
        tokio::spawn(run_session_manager_actor(actor));
        Self {
            sender,
            loader,
            rank_store,
            quiz_config: Arc::new(quiz_config),
        }
    }

    /// Loads the question bank and registers a new session. Nothing is registered when the
    /// load fails.
    #[tracing::instrument(skip(self))]
    pub async fn start_session(
        &self,
        quiz_id: Option<String>,
        count: Option<String>,
    ) -> Result<SessionSnapshot, SessionError> {
        let quiz_id = quiz_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .or_else(|| self.quiz_config.default_quiz_id.clone())
            .ok_or(LoadError::MissingIdentifier)?;

        let document = self.loader.load(&quiz_id).await?;
        let count = QuestionCount::parse(count.as_deref(), self.quiz_config.default_question_count);

        let session = QuizSession::new(
            quiz_id,
            document,
            count,
            self.quiz_config.answer_policy,
            self.quiz_config.shuffle_options,
        );

        self.request(|respond_to| SessionManagerMessage::Register {
            session: Box::new(session),
            respond_to,
        })
        .await
    }

    pub async fn snapshot(&self, session_id: Uuid) -> Result<SessionSnapshot, SessionError> {
        self.request(|respond_to| SessionManagerMessage::Snapshot {
            session_id,
            respond_to,
        })
        .await
    }

    pub async fn select_option(
        &self,
        session_id: Uuid,
        option: String,
    ) -> Result<SessionSnapshot, SessionError> {
        self.request(|respond_to| SessionManagerMessage::SelectOption {
            session_id,
            option,
            respond_to,
        })
        .await
    }

    pub async fn submit(
        &self,
        session_id: Uuid,
        option: Option<String>,
    ) -> Result<SessionSnapshot, SessionError> {
        self.request(|respond_to| SessionManagerMessage::Submit {
            session_id,
            option,
            respond_to,
        })
        .await
    }

    /// Moves past a revealed question. The advance that finishes a session also stores its
    /// rank; only that one advance can succeed into `Finished`, so the rank is written once.
    pub async fn advance(&self, session_id: Uuid) -> Result<SessionSnapshot, SessionError> {
        let snapshot = self
            .request(|respond_to| SessionManagerMessage::Advance {
                session_id,
                respond_to,
            })
            .await?;

        if let Some(result) = &snapshot.result {
            self.persist_rank(&snapshot.quiz_id, result.rank).await;
        }
        Ok(snapshot)
    }

    // Runs in the caller's task so a slow store never blocks the actor.
    async fn persist_rank(&self, quiz_id: &str, rank: Rank) {
        if let Err(e) = self.rank_store.save_rank(quiz_id, rank).await {
            tracing::warn!(
                error = %e,
                quiz.id = %quiz_id,
                rank = %rank,
                "Failed to persist quiz rank"
            );
        }
    }

    pub async fn close(&self, session_id: Uuid) -> Result<(), SessionError> {
        self.request(|respond_to| SessionManagerMessage::Close {
            session_id,
            respond_to,
        })
        .await
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> SessionManagerMessage,
    ) -> Result<T, SessionError> {
        let (respond_to, rx) = oneshot::channel();
        self.sender
            .send(build(respond_to))
            .await
            .map_err(|e| SessionError::Unavailable(format!("Failed to send command: {e}")))?;
        rx.await
            .map_err(|e| SessionError::Unavailable(format!("SessionManager no response: {e}")))?
    }
}
