//! Scripted remote shell used by unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::shell::{RemoteShell, ShellOutput};

/// One scripted reaction to a command.
#[derive(Debug, Clone)]
pub enum Step {
    Output(ShellOutput),
    /// Never completes within any sane timeout.
    Hang,
}

impl Step {
    pub fn ok(stdout: &str) -> Self {
        Step::Output(ShellOutput {
            code: Some(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
        })
    }

    pub fn exit(code: i32, stderr: &str) -> Self {
        Step::Output(ShellOutput {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.to_string(),
        })
    }
}

/// Replays scripted steps per (device, command). The last step repeats;
/// unscripted pairs fail with exit status 255.
#[derive(Debug, Default)]
pub struct ScriptedShell {
    scripts: Mutex<HashMap<(String, String), VecDeque<Step>>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedShell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, device: &str, command: &str, stdout: &str) -> Self {
        self.steps(device, command, vec![Step::ok(stdout)])
    }

    pub fn steps(self, device: &str, command: &str, steps: Vec<Step>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert((device.to_string(), command.to_string()), steps.into());
        self
    }

    pub fn call_count(&self, device: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(d, _)| d == device)
            .count()
    }

    fn next_step(&self, device: &str, command: &str) -> Step {
        let mut scripts = self.scripts.lock().unwrap();
        let Some(queue) = scripts.get_mut(&(device.to_string(), command.to_string())) else {
            return Step::exit(255, "ssh: Could not resolve hostname");
        };

        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().cloned().unwrap_or(Step::exit(255, "empty script"))
        }
    }
}

#[async_trait]
impl RemoteShell for ScriptedShell {
    async fn execute(&self, device: &str, command: &str) -> std::io::Result<ShellOutput> {
        self.calls
            .lock()
            .unwrap()
            .push((device.to_string(), command.to_string()));

        match self.next_step(device, command) {
            Step::Output(output) => Ok(output),
            Step::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(ShellOutput::default())
            }
        }
    }
}
