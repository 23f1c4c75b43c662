use serde::Serialize;
use tracing::debug;

/// The three steps of the upload → prompt → result flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardStep {
    Upload,
    Prompt,
    Completed,
}

impl WizardStep {
    pub fn index(&self) -> u8 {
        match self {
            WizardStep::Upload => 0,
            WizardStep::Prompt => 1,
            WizardStep::Completed => 2,
        }
    }
}

/// Typed events driving the wizard. UI callbacks translate button clicks and
/// upload completions into these.
#[derive(Debug, Clone, PartialEq)]
pub enum WizardEvent {
    Next,
    Back,
    DatasetLoaded,
    PromptSubmitted(String),
}

/// Side effects requested by a transition. The wizard itself stays pure; the
/// caller executes these after applying the event.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Dispatch { prompt: String },
}

/// Button enablement and labelling derived from the current step. Pure
/// presentation data, computed entirely from `(step, dataset_present)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Controls {
    pub next_enabled: bool,
    pub back_enabled: bool,
    pub next_label: &'static str,
}

/// The wizard state machine.
///
/// Steps move by exactly one per `Next`/`Back`, except at `Completed` where
/// `Next` is a self-loop that re-dispatches the current prompt (the "Ask
/// again" affordance). `Next` at `Upload` without a dataset is ignored.
#[derive(Debug, Clone)]
pub struct Wizard {
    step: WizardStep,
    dataset_present: bool,
    prompt: Option<String>,
}

impl Wizard {
    pub fn new() -> Self {
        Self {
            step: WizardStep::Upload,
            dataset_present: false,
            prompt: None,
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    /// Applies one event and returns the commands the caller must execute.
    pub fn apply(&mut self, event: WizardEvent) -> Vec<Command> {
        let commands = match (self.step, event) {
            (WizardStep::Upload, WizardEvent::Next) => {
                if self.dataset_present {
                    self.step = WizardStep::Prompt;
                } else {
                    debug!("Ignoring Next at Upload: no dataset loaded");
                }
                Vec::new()
            }
            (WizardStep::Prompt, WizardEvent::Next) => {
                self.step = WizardStep::Completed;
                self.dispatch_command()
            }
            // Self-loop: re-ask with the latest submitted prompt.
            (WizardStep::Completed, WizardEvent::Next) => self.dispatch_command(),
            (WizardStep::Prompt, WizardEvent::Back) => {
                self.step = WizardStep::Upload;
                Vec::new()
            }
            (WizardStep::Completed, WizardEvent::Back) => {
                self.step = WizardStep::Prompt;
                Vec::new()
            }
            (WizardStep::Upload, WizardEvent::Back) => Vec::new(),
            (_, WizardEvent::DatasetLoaded) => {
                self.dataset_present = true;
                Vec::new()
            }
            (_, WizardEvent::PromptSubmitted(text)) => {
                self.prompt = Some(text);
                Vec::new()
            }
        };

        debug!(
            "Wizard at step {} ({} command(s) emitted)",
            self.step.index(),
            commands.len()
        );
        commands
    }

    fn dispatch_command(&self) -> Vec<Command> {
        match &self.prompt {
            Some(prompt) => vec![Command::Dispatch {
                prompt: prompt.clone(),
            }],
            None => Vec::new(),
        }
    }

    pub fn controls(&self) -> Controls {
        match self.step {
            WizardStep::Upload => Controls {
                next_enabled: self.dataset_present,
                back_enabled: false,
                next_label: "Next",
            },
            WizardStep::Prompt => Controls {
                next_enabled: true,
                back_enabled: true,
                next_label: "Ask ChartGPT",
            },
            WizardStep::Completed => Controls {
                next_enabled: true,
                back_enabled: true,
                next_label: "Ask again",
            },
        }
    }
}

impl Default for Wizard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded_wizard_at_prompt() -> Wizard {
        let mut wizard = Wizard::new();
        wizard.apply(WizardEvent::DatasetLoaded);
        wizard.apply(WizardEvent::Next);
        assert_eq!(wizard.step(), WizardStep::Prompt);
        wizard
    }

    #[test]
    fn next_without_dataset_is_ignored_repeatedly() {
        let mut wizard = Wizard::new();
        for _ in 0..5 {
            let commands = wizard.apply(WizardEvent::Next);
            assert!(commands.is_empty());
            assert_eq!(wizard.step(), WizardStep::Upload);
        }
    }

    #[test]
    fn back_at_upload_is_a_no_op() {
        let mut wizard = Wizard::new();
        assert!(wizard.apply(WizardEvent::Back).is_empty());
        assert_eq!(wizard.step(), WizardStep::Upload);
    }

    #[test]
    fn dataset_enables_forward_transition() {
        let mut wizard = Wizard::new();
        wizard.apply(WizardEvent::DatasetLoaded);
        wizard.apply(WizardEvent::Next);
        assert_eq!(wizard.step(), WizardStep::Prompt);
    }

    #[test]
    fn back_then_next_returns_to_prompt() {
        let mut wizard = loaded_wizard_at_prompt();
        wizard.apply(WizardEvent::Back);
        assert_eq!(wizard.step(), WizardStep::Upload);
        wizard.apply(WizardEvent::Next);
        assert_eq!(wizard.step(), WizardStep::Prompt);
    }

    #[test]
    fn back_twice_from_completed_returns_to_upload() {
        let mut wizard = loaded_wizard_at_prompt();
        wizard.apply(WizardEvent::PromptSubmitted("chart a vs b".to_string()));
        wizard.apply(WizardEvent::Next);
        assert_eq!(wizard.step(), WizardStep::Completed);

        wizard.apply(WizardEvent::Back);
        assert_eq!(wizard.step(), WizardStep::Prompt);
        wizard.apply(WizardEvent::Back);
        assert_eq!(wizard.step(), WizardStep::Upload);
    }

    #[test]
    fn advancing_from_prompt_dispatches_the_submitted_prompt() {
        let mut wizard = loaded_wizard_at_prompt();
        wizard.apply(WizardEvent::PromptSubmitted("visualize a".to_string()));
        let commands = wizard.apply(WizardEvent::Next);
        assert_eq!(
            commands,
            vec![Command::Dispatch {
                prompt: "visualize a".to_string()
            }]
        );
    }

    #[test]
    fn ask_again_redispatches_without_changing_step() {
        let mut wizard = loaded_wizard_at_prompt();
        wizard.apply(WizardEvent::PromptSubmitted("sum of a".to_string()));
        wizard.apply(WizardEvent::Next);

        wizard.apply(WizardEvent::PromptSubmitted("mean of b".to_string()));
        let commands = wizard.apply(WizardEvent::Next);
        assert_eq!(wizard.step(), WizardStep::Completed);
        assert_eq!(
            commands,
            vec![Command::Dispatch {
                prompt: "mean of b".to_string()
            }]
        );
    }

    #[test]
    fn controls_follow_step_and_dataset_presence() {
        let mut wizard = Wizard::new();
        let controls = wizard.controls();
        assert!(!controls.next_enabled);
        assert!(!controls.back_enabled);
        assert_eq!(controls.next_label, "Next");

        wizard.apply(WizardEvent::DatasetLoaded);
        assert!(wizard.controls().next_enabled);

        wizard.apply(WizardEvent::Next);
        let controls = wizard.controls();
        assert!(controls.next_enabled);
        assert!(controls.back_enabled);
        assert_eq!(controls.next_label, "Ask ChartGPT");

        wizard.apply(WizardEvent::PromptSubmitted("chart it".to_string()));
        wizard.apply(WizardEvent::Next);
        assert_eq!(wizard.controls().next_label, "Ask again");
    }
}
