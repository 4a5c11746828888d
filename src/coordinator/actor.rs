//! Actor wrapping the coordinator core.

use tokio::sync::mpsc;

use super::commands::{CoordinatorCommand, PipelineEvent};
use super::core::{StreamReadCoordinator, Teardown};
use super::handle::CoordinatorHandle;
use super::padding::AudioPaddingPolicy;
use crate::config::{self, BridgeConfig};
use crate::consumer::{Consumer, NeedKeyCallback};
use crate::demuxer::{DemuxerHost, DemuxerSource, HostEvent};

/// Options for [`spawn_coordinator`].
pub struct CoordinatorOptions {
    /// Identifier passed back with every acknowledgement
    pub player_id: i32,
    /// Batch sizes, padding and channel capacity
    pub config: BridgeConfig,
    /// Receives key requests from the demuxer
    pub need_key: Option<NeedKeyCallback>,
    /// Replaces the padding policy chosen from `config`
    pub padding: Option<Box<dyn AudioPaddingPolicy>>,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self::new(0)
    }
}

impl CoordinatorOptions {
    /// Options using the process-wide configuration.
    pub fn new(player_id: i32) -> Self {
        Self {
            player_id,
            config: config::global(),
            need_key: None,
            padding: None,
        }
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the key request callback.
    pub fn with_need_key(mut self, callback: NeedKeyCallback) -> Self {
        self.need_key = Some(callback);
        self
    }

    /// Sets the padding policy.
    pub fn with_padding(mut self, policy: Box<dyn AudioPaddingPolicy>) -> Self {
        self.padding = Some(policy);
        self
    }
}

/// Spawns the coordinator actor, starts demuxer initialization and returns
/// its handle.
///
/// The actor owns all coordinator state and applies commands and demuxer
/// completions one at a time, so no locking is needed. It runs until the
/// demuxer has been stopped after [`CoordinatorHandle::destroy`], or until
/// every handle is dropped.
///
/// # Examples
/// ```rust,no_run
/// # #[tokio::main]
/// # async fn main() -> msebridge::Result<()> {
/// use std::sync::Arc;
/// use msebridge::av::{AudioCodec, AudioDecoderConfig, ChannelLayout, StreamType};
/// use msebridge::consumer::ChannelConsumer;
/// use msebridge::coordinator::{spawn_coordinator, CoordinatorOptions};
/// use msebridge::demuxer::mock::MockDemuxer;
/// use msebridge::demuxer::DemuxerSource;
///
/// let demuxer = Arc::new(
///     MockDemuxer::new()
///         .with_audio(AudioDecoderConfig::new(AudioCodec::AAC, ChannelLayout::Stereo, 44100))
///         .chunked(30.0),
/// );
/// let (consumer, mut events) = ChannelConsumer::unbounded();
/// let handle = spawn_coordinator(
///     DemuxerSource::MediaSource(demuxer),
///     Box::new(consumer),
///     CoordinatorOptions::new(7),
/// );
///
/// let generation = handle.seek(std::time::Duration::from_secs(10)).await?;
/// handle.request_batch(StreamType::Audio, generation).await?;
/// while let Some(event) = events.recv().await {
///     println!("{:?}", event);
/// }
/// # Ok(())
/// # }
/// ```
pub fn spawn_coordinator(
    source: DemuxerSource,
    consumer: Box<dyn Consumer>,
    options: CoordinatorOptions,
) -> CoordinatorHandle {
    let (sender, receiver) = mpsc::channel(options.config.command_buffer.max(1));
    let (event_sender, event_receiver) = mpsc::unbounded_channel();
    let (host_sender, host_receiver) = mpsc::unbounded_channel();

    let mut coordinator = StreamReadCoordinator::new(
        options.player_id,
        source,
        consumer,
        &options.config,
        event_sender,
    );
    if let Some(callback) = options.need_key {
        coordinator.set_need_key_callback(callback);
    }
    if let Some(policy) = options.padding {
        coordinator.set_padding_policy(policy);
    }
    log::debug!(
        "Coordinator {} batching {} access units",
        options.player_id,
        coordinator.access_unit_size()
    );

    tokio::spawn(async move {
        coordinator.initialize(DemuxerHost::new(host_sender));
        run_actor_loop(coordinator, receiver, event_receiver, host_receiver).await;
    });

    CoordinatorHandle::new(sender)
}

/// Processes commands, demuxer completions and host events in arrival order
/// until the coordinator is finished.
async fn run_actor_loop(
    mut coordinator: StreamReadCoordinator,
    mut commands: mpsc::Receiver<CoordinatorCommand>,
    mut events: mpsc::UnboundedReceiver<PipelineEvent>,
    mut host_events: mpsc::UnboundedReceiver<HostEvent>,
) {
    log::debug!("Coordinator actor started");
    let mut commands_open = true;
    let mut torn_down = false;

    loop {
        tokio::select! {
            command = commands.recv(), if commands_open => match command {
                Some(CoordinatorCommand::Destroy) => {
                    torn_down = true;
                    if !teardown(&mut coordinator) {
                        break;
                    }
                }
                Some(command) => handle_command(&mut coordinator, command),
                None => {
                    // Every handle is gone; nobody can ask for teardown anymore.
                    commands_open = false;
                    if !torn_down {
                        torn_down = true;
                        if !teardown(&mut coordinator) {
                            break;
                        }
                    }
                }
            },
            Some(event) = events.recv() => {
                if !coordinator.on_event(event) {
                    break;
                }
            }
            Some(event) = host_events.recv() => coordinator.on_host_event(event),
            else => break,
        }
    }

    log::debug!("Coordinator actor stopped");
}

/// Returns `false` when the coordinator finished on the spot.
fn teardown(coordinator: &mut StreamReadCoordinator) -> bool {
    match coordinator.destroy() {
        Ok(Teardown::Finished) => false,
        Ok(Teardown::Pending) => true,
        Err(e) => {
            log::error!("Fatal coordinator lifecycle violation: {}", e);
            std::process::abort();
        }
    }
}

fn handle_command(coordinator: &mut StreamReadCoordinator, command: CoordinatorCommand) {
    match command {
        CoordinatorCommand::RequestBatch {
            stream_type,
            seek_generation,
        } => coordinator.request_batch(stream_type, seek_generation),

        CoordinatorCommand::Seek { time, responder } => {
            let generation = coordinator.seek(time);
            let _ = responder.send(generation);
        }

        CoordinatorCommand::CancelPendingSeek => coordinator.cancel_pending_seek(),

        CoordinatorCommand::NotifyReady { key_system } => coordinator.notify_ready(&key_system),

        CoordinatorCommand::MediaConfigRequest => coordinator.on_media_config_request(),

        CoordinatorCommand::GetBuffered { responder } => {
            let _ = responder.send(coordinator.buffered());
        }

        CoordinatorCommand::GetStatistics { responder } => {
            let _ = responder.send(coordinator.statistics());
        }

        CoordinatorCommand::GetDurationMs { responder } => {
            let _ = responder.send(coordinator.duration_ms());
        }

        CoordinatorCommand::Destroy => {
            // Routed through `teardown` by the actor loop.
        }
    }
}
