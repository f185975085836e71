//! Event loop integration
//!
//! Wraps calloop and feeds dispatched tasks into it through a channel.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use calloop::channel::{self, Channel, Sender};
use calloop::{EventLoop as CalLoop, LoopSignal};
use log::warn;

use crate::error::NucleusError;
use crate::nucleus::{Task, TaskQueue};

/// Sending half of the task channel
pub struct ChannelQueue {
    sender: Mutex<Sender<Task>>,
}

impl TaskQueue for ChannelQueue {
    fn post(&self, task: Task) {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        if sender.send(task).is_err() {
            warn!("event loop is gone, dropping task");
        }
    }
}

/// calloop event loop with a task channel attached
pub struct EventLoop {
    /// Calloop event loop
    event_loop: CalLoop<'static, ()>,
    /// Loop signal for waking
    signal: LoopSignal,
    /// Queue feeding the task channel
    tasks: Arc<ChannelQueue>,
}

impl EventLoop {
    /// Create a new event loop
    pub fn new() -> Result<Self, NucleusError> {
        let event_loop = CalLoop::try_new()?;
        let signal = event_loop.get_signal();

        let (sender, channel): (Sender<Task>, Channel<Task>) = channel::channel();
        event_loop
            .handle()
            .insert_source(channel, |event, _, _| {
                if let channel::Event::Msg(task) = event {
                    task();
                }
            })
            .map_err(|e| e.error)?;

        Ok(Self {
            event_loop,
            signal,
            tasks: Arc::new(ChannelQueue {
                sender: Mutex::new(sender),
            }),
        })
    }

    /// Queue executed by `dispatch`, usable from any thread
    pub fn task_queue(&self) -> Arc<ChannelQueue> {
        self.tasks.clone()
    }

    /// Get the loop signal for waking
    pub fn signal(&self) -> LoopSignal {
        self.signal.clone()
    }

    /// Run one iteration of the event loop
    pub fn dispatch(&mut self, timeout: Option<Duration>) -> Result<(), NucleusError> {
        self.event_loop.dispatch(timeout, &mut ())?;
        Ok(())
    }
}
