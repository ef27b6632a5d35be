// SPDX-License-Identifier: MIT OR Apache-2.0
//! Flow playback over a story.

use serde::{Deserialize, Serialize};
use storyloom_graph::{resolve, BranchWarning, Choice, Node, NodeId, Resolution, Story, VariableState};

use crate::sound::{SoundBoard, SoundCue};
use crate::stage::{Stage, StageTransition};

/// Default limit on nodes played without a choice
pub const DEFAULT_MAX_AUTO_STEPS: usize = 1000;

/// Playback errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlayerError {
    /// Start or target node does not exist
    #[error("Node not found: {0}")]
    UnknownNode(NodeId),

    /// Nothing is playing
    #[error("Playback has not started")]
    NotStarted,

    /// The current node is waiting for the user to choose
    #[error("A choice is required to continue")]
    ChoiceRequired,

    /// `choose` called while no choices are shown
    #[error("No choice is pending")]
    NoChoicePending,

    /// Choice index out of range
    #[error("Choice {index} is out of range ({available} available)")]
    InvalidChoice {
        /// Requested index
        index: usize,
        /// Number of choices shown
        available: usize,
    },

    /// Automatic continuation ran too long, likely a loop
    #[error("Stopped after {0} automatic steps")]
    StepLimit(usize),
}

/// Player tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerOptions {
    /// Steps `run_to_choice` takes before giving up
    pub max_auto_steps: usize,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self {
            max_auto_steps: DEFAULT_MAX_AUTO_STEPS,
        }
    }
}

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerState {
    /// Not started or stopped
    #[default]
    Idle,
    /// A node is shown and continues on `advance`
    Showing,
    /// A node is shown with choices
    AwaitingChoice,
    /// The flow ended
    Finished,
}

impl PlayerState {
    /// Whether a node is on screen
    pub fn is_active(&self) -> bool {
        matches!(self, PlayerState::Showing | PlayerState::AwaitingChoice)
    }

    /// Short status label
    pub fn status_text(&self) -> &'static str {
        match self {
            PlayerState::Idle => "Idle",
            PlayerState::Showing => "Playing",
            PlayerState::AwaitingChoice => "Waiting for choice",
            PlayerState::Finished => "Finished",
        }
    }
}

/// Everything produced by entering one node
#[derive(Debug, Clone, PartialEq)]
pub struct Beat {
    /// Node entered
    pub node: NodeId,
    /// Node title
    pub title: String,
    /// Speaker name
    pub speaker: String,
    /// Speaker color
    pub speaker_color: String,
    /// Dialogue text
    pub dialogue: String,
    /// Stage changes to render
    pub stage: StageTransition,
    /// Audio to start and stop
    pub sounds: Vec<SoundCue>,
    /// Variable changes that wrote a value
    pub changes_applied: usize,
    /// Where the flow goes from here
    pub resolution: Resolution,
    /// Authoring problems met while resolving
    pub warnings: Vec<BranchWarning>,
}

/// Plays a story node by node
///
/// Variable changes made during playback live in the player's own
/// [`VariableState`]; the story's authored defaults are never touched.
#[derive(Debug)]
pub struct FlowPlayer<'a> {
    story: &'a Story,
    options: PlayerOptions,
    variables: VariableState,
    current: Option<NodeId>,
    resolution: Option<Resolution>,
    stage: Stage,
    sounds: SoundBoard,
    history: Vec<NodeId>,
    state: PlayerState,
}

impl<'a> FlowPlayer<'a> {
    /// Create an idle player with default options
    pub fn new(story: &'a Story) -> Self {
        Self::with_options(story, PlayerOptions::default())
    }

    /// Create an idle player
    pub fn with_options(story: &'a Story, options: PlayerOptions) -> Self {
        Self {
            story,
            options,
            variables: story.session(),
            current: None,
            resolution: None,
            stage: Stage::new(),
            sounds: SoundBoard::new(),
            history: Vec::new(),
            state: PlayerState::Idle,
        }
    }

    /// Start a fresh session at a node
    pub fn start(&mut self, node_id: &NodeId) -> Result<Beat, PlayerError> {
        if !self.story.graph.contains_node(node_id) {
            return Err(PlayerError::UnknownNode(node_id.clone()));
        }
        self.reset();
        tracing::info!("Starting playback at {}", node_id);
        self.enter(node_id)
    }

    /// Follow an automatic continuation
    ///
    /// Returns `None` once the flow has ended.
    pub fn advance(&mut self) -> Result<Option<Beat>, PlayerError> {
        match self.state {
            PlayerState::Idle => Err(PlayerError::NotStarted),
            PlayerState::AwaitingChoice => Err(PlayerError::ChoiceRequired),
            PlayerState::Finished => Ok(None),
            PlayerState::Showing => {
                let target = self.resolution.as_ref().and_then(Resolution::next_node).cloned();
                match target {
                    Some(target) => self.enter(&target).map(Some),
                    None => {
                        self.finish();
                        Ok(None)
                    }
                }
            }
        }
    }

    /// Take one of the shown choices
    ///
    /// Returns `None` when the chosen item leads nowhere.
    pub fn choose(&mut self, index: usize) -> Result<Option<Beat>, PlayerError> {
        match self.state {
            PlayerState::Idle => return Err(PlayerError::NotStarted),
            PlayerState::AwaitingChoice => {}
            _ => return Err(PlayerError::NoChoicePending),
        }

        let choices = self.choices();
        let choice = choices.get(index).ok_or(PlayerError::InvalidChoice {
            index,
            available: choices.len(),
        })?;
        tracing::debug!("Chose `{}`", choice.title);

        match choice.target.clone() {
            Some(target) => self.enter(&target).map(Some),
            None => {
                self.finish();
                Ok(None)
            }
        }
    }

    /// Follow continuations until a choice is shown or the flow ends
    pub fn run_to_choice(&mut self) -> Result<Vec<Beat>, PlayerError> {
        let mut beats = Vec::new();
        while self.state == PlayerState::Showing {
            if beats.len() >= self.options.max_auto_steps {
                tracing::warn!("Automatic playback stopped after {} steps", beats.len());
                return Err(PlayerError::StepLimit(self.options.max_auto_steps));
            }
            match self.advance()? {
                Some(beat) => beats.push(beat),
                None => break,
            }
        }
        if self.state == PlayerState::Idle {
            return Err(PlayerError::NotStarted);
        }
        Ok(beats)
    }

    /// Stop playback, returning the cues that silence continuing sounds
    pub fn stop(&mut self) -> Vec<SoundCue> {
        let cues = self.sounds.stop_all();
        self.stage.clear();
        self.current = None;
        self.resolution = None;
        self.state = PlayerState::Idle;
        tracing::info!("Playback stopped");
        cues
    }

    /// Choices currently shown
    pub fn choices(&self) -> &[Choice] {
        match &self.resolution {
            Some(Resolution::Choices(choices)) if self.state == PlayerState::AwaitingChoice => choices,
            _ => &[],
        }
    }

    /// Session variables
    pub fn variables(&self) -> &VariableState {
        &self.variables
    }

    /// Node on screen
    pub fn current(&self) -> Option<&'a Node> {
        let story = self.story;
        self.current.as_ref().and_then(|id| story.graph.node(id))
    }

    /// Nodes entered this session, in order
    pub fn history(&self) -> &[NodeId] {
        &self.history
    }

    /// Playback state
    pub fn state(&self) -> PlayerState {
        self.state
    }

    /// What is on stage
    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    fn reset(&mut self) {
        self.variables = self.story.session();
        self.current = None;
        self.resolution = None;
        self.stage.clear();
        self.sounds = SoundBoard::new();
        self.history.clear();
        self.state = PlayerState::Idle;
    }

    fn finish(&mut self) {
        self.state = PlayerState::Finished;
        tracing::info!("Playback finished after {} nodes", self.history.len());
    }

    fn enter(&mut self, node_id: &NodeId) -> Result<Beat, PlayerError> {
        let story = self.story;
        let node = story
            .graph
            .node(node_id)
            .ok_or_else(|| PlayerError::UnknownNode(node_id.clone()))?;

        // Changes land before this node's own items are resolved
        let changes_applied = self.variables.apply_all(&node.variable_changes);

        let stage = self.stage.transition(&node.scene);
        let mut sounds = self.sounds.enter(&node.sounds);
        sounds.extend(
            stage
                .enters
                .iter()
                .flat_map(|enter| enter.effects.iter().cloned().map(SoundCue::Effect)),
        );

        let branch = resolve(node, &self.variables);
        self.state = match &branch.resolution {
            Resolution::Choices(_) => PlayerState::AwaitingChoice,
            Resolution::End => PlayerState::Finished,
            Resolution::Continue { .. } | Resolution::Fallback { .. } => PlayerState::Showing,
        };
        self.current = Some(node.id.clone());
        self.resolution = Some(branch.resolution.clone());
        self.history.push(node.id.clone());
        tracing::debug!("Entered {} ({})", node.title, node.id);

        Ok(Beat {
            node: node.id.clone(),
            title: node.title.clone(),
            speaker: node.speaker.clone(),
            speaker_color: node.speaker_color.clone(),
            dialogue: node.dialogue.clone(),
            stage,
            sounds,
            changes_applied,
            resolution: branch.resolution,
            warnings: branch.warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyloom_graph::{
        Condition, ConditionOperator, ItemDetails, NodeDetails, VariableChange, VariableOperation, VariableType,
    };

    fn gate_story() -> (Story, NodeId, NodeId, NodeId) {
        let mut story = Story::new("Gate");
        story.variables.define("gold", VariableType::Number, "10");

        let mut gate = NodeDetails::titled("Gate").with_dialogue("Guard", "Toll is 12 gold.");
        gate.variable_changes = vec![VariableChange::new("gold", VariableOperation::Add, "5")];
        let gate = story.graph.add_node([0.0, 0.0], gate);
        let inside = story.graph.add_node([250.0, 0.0], NodeDetails::titled("Inside"));
        let outside = story.graph.add_node([250.0, 150.0], NodeDetails::titled("Outside"));

        let pay = ItemDetails::choice("Pay")
            .with_condition(Condition::new("gold", ConditionOperator::Greater, "12"))
            .with_target(inside.clone());
        story.graph.add_item(&gate, pay).unwrap();
        let leave = ItemDetails::choice("Leave").with_target(outside.clone());
        story.graph.add_item(&gate, leave).unwrap();

        (story, gate, inside, outside)
    }

    #[test]
    fn test_start_unknown_node() {
        let story = Story::new("Empty");
        let mut player = FlowPlayer::new(&story);
        let missing = NodeId::from("missing");
        assert_eq!(player.start(&missing), Err(PlayerError::UnknownNode(missing)));
        assert_eq!(player.state(), PlayerState::Idle);
    }

    #[test]
    fn test_changes_apply_before_choices() {
        let (story, gate, inside, _) = gate_story();
        let mut player = FlowPlayer::new(&story);

        let beat = player.start(&gate).unwrap();
        assert_eq!(beat.changes_applied, 1);
        assert_eq!(beat.speaker, "Guard");
        assert_eq!(player.state(), PlayerState::AwaitingChoice);
        assert_eq!(player.choices().len(), 2);
        assert_eq!(player.variables().get("gold").and_then(|v| v.as_number()), Some(15.0));

        let beat = player.choose(0).unwrap().unwrap();
        assert_eq!(beat.node, inside);
        assert_eq!(player.state(), PlayerState::Finished);
        assert_eq!(player.history().len(), 2);
    }

    #[test]
    fn test_session_does_not_touch_defaults() {
        let (story, gate, _, _) = gate_story();
        let mut player = FlowPlayer::new(&story);
        player.start(&gate).unwrap();
        player.start(&gate).unwrap();

        assert_eq!(player.variables().get("gold").and_then(|v| v.as_number()), Some(15.0));
        assert_eq!(story.session().get("gold").and_then(|v| v.as_number()), Some(10.0));
    }

    #[test]
    fn test_choice_errors() {
        let (story, gate, _, _) = gate_story();
        let mut player = FlowPlayer::new(&story);
        assert_eq!(player.advance(), Err(PlayerError::NotStarted));
        assert_eq!(player.choose(0), Err(PlayerError::NotStarted));

        player.start(&gate).unwrap();
        assert_eq!(player.advance(), Err(PlayerError::ChoiceRequired));
        assert_eq!(
            player.choose(5),
            Err(PlayerError::InvalidChoice { index: 5, available: 2 })
        );

        player.choose(1).unwrap();
        assert_eq!(player.choose(0), Err(PlayerError::NoChoicePending));
        assert_eq!(player.advance(), Ok(None));
    }

    #[test]
    fn test_loop_hits_step_limit() {
        let mut story = Story::new("Loop");
        let a = story.graph.add_node([0.0, 0.0], NodeDetails::titled("A"));
        let b = story.graph.add_node([250.0, 0.0], NodeDetails::titled("B"));
        story.graph.add_item(&a, ItemDetails::continuation(b.clone())).unwrap();
        story.graph.add_item(&b, ItemDetails::continuation(a.clone())).unwrap();

        let mut player = FlowPlayer::with_options(&story, PlayerOptions { max_auto_steps: 10 });
        player.start(&a).unwrap();
        assert_eq!(player.run_to_choice(), Err(PlayerError::StepLimit(10)));
    }

    #[test]
    fn test_stop_resets() {
        let (story, gate, _, _) = gate_story();
        let mut player = FlowPlayer::new(&story);
        player.start(&gate).unwrap();
        assert!(player.current().is_some());

        player.stop();
        assert_eq!(player.state(), PlayerState::Idle);
        assert!(player.current().is_none());
        assert!(player.choices().is_empty());
    }
}
