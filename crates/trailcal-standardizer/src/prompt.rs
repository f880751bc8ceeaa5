//! Prompt template sent with every standardization request.
//!
//! The system instruction and the few-shot exchanges define the output
//! format the pipeline relies on (summary on the first line, description
//! after it). They are a value rather than inline literals so a revised
//! template can be loaded from a file and tested on its own.

use serde::{Deserialize, Serialize};

/// Who produced a turn of the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Text sent to the model.
    User,
    /// Text the model is expected to produce.
    Model,
}

/// One turn of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    /// A user turn.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    /// A model turn.
    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }
}

/// A worked example: raw input and the reply expected for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    pub input: String,
    pub output: String,
}

impl Exchange {
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
        }
    }
}

/// System instruction, examples and sampling parameters for one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptTemplate {
    /// Model identifier passed to the service.
    pub model: String,
    /// Sampling temperature.
    #[serde(default)]
    pub temperature: f64,
    /// Nucleus sampling threshold.
    #[serde(default = "default_top_p")]
    pub top_p: f64,
    /// Instruction describing the task and the output format.
    pub system_instruction: String,
    /// Few-shot exchanges replayed before the user turn.
    #[serde(default)]
    pub examples: Vec<Exchange>,
}

fn default_top_p() -> f64 {
    0.1
}

const DEFAULT_MODEL: &str = "gemini-2.5-flash-preview-04-17";

const TRAIL_TEAM_INSTRUCTION: &str = r#"You are an expert in cleaning up and formatting descriptions of events for a trail running team.
The trail running team consists of multiple groups of various skill levels.
The groups are Group 1, Group 2, Group 3 and Group 4.
Sometimes groups are combined for a run, so you may see Group 2,3 or Group 2,3,4.
Level is a synonym for group.
Sometimes there is an intermediate group, such as Group 2.5 or Level 3.5.
The name of the team is KHraces Trail Team or DDD (Dirt Divas and Dudes).

The first line of the user's message will be an initial summary of the event. The second and remaining lines will be a description of the event.
You should reply in the following format:

Summary will be one line of text providing a summary of the type of event
- Remove "KHraces Trail Team - " from the beginning of the summary
- If the entire team practices together at a specific real world location, specify Team Practice and the location
- Otherwise, provide a short description of the type of workout and the mileage
  - common workout types are "Easy 8mi", "Hill Repeats 3x1mi", "Long 20mi", "Speed Legs 6mi", "Fast Finish 6mi"
- If there are extra non-running workouts, add that to the summary as "& Workouts"
- Use Title Case for the summary
- If there are workouts and runs, please list the run first, then the workouts

Description will be multiple lines of text describing the event
- Remove any (Arrival Time:)
- Remove any Location:
- If different groups receive different instructions, preferentially provide only the instructions for group 3.5. If group 3.5 does not exist, provide the instructions for group 3.
"#;

const EVENT_BLOCK_INSTRUCTION: &str = r#"You are an expert in cleaning up and formatting calendar events for a trail running team.
The trail running team consists of multiple groups of various skill levels.
The groups are Group 1, Group 2, Group 3 and Group 4.
Sometimes groups are combined for a run, so you may see Group 2,3 or Group 2,3,4.
Level is a synonym for group.
Sometimes there is an intermediate group, such as Group 2.5 or Level 3.5.
The name of the team is DDD (Dirt Divas and Dudes).

The user's message is a single iCalendar VEVENT block.
Reply with only the corrected VEVENT block, using iCalendar escaping for its values.

SUMMARY should be a short (5 words or less) Title Case summary with the type of workout and the mileage for the user's group (e.g "Easy 14", "Hill Repeats 3x1mi").
If it is a team workout, specify merely that and the location.

DESCRIPTION should keep only the information for group 3.5 if it exists, otherwise group 3, without the group prefix.
Remove any arrival time and any copy of the LOCATION.

Leave DTSTART and DTEND unchanged.
"#;

impl PromptTemplate {
    /// The club's template for two-part text replies.
    pub fn trail_team() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.0,
            top_p: default_top_p(),
            system_instruction: TRAIL_TEAM_INSTRUCTION.to_string(),
            examples: vec![
                Exchange::new(
                    "KHraces Trail Team - Team Practice - still casual miles\nLocation: Fullerton Loop\n This is a very casual team meet up. It will be a 10 mile loop out and back. Those wanting more miles can repeat it and those wanting less can turn around early.  (Arrival Time:  6:30 AM (Pacific Time (US & Canada)))",
                    "Team Practice - Fullerton Loop\nThis is a very casual team meet up. It will be a 10 mile loop out and back. Those wanting more miles can repeat it and those wanting less can turn around early.",
                ),
                Exchange::new(
                    "KHraces Trail Team - Hills- You missed these! See Notes.\nGroup 1: Find a steep hill about a 1/4 mile long (it can be a little longer than that). It can be road or trail. Run up to the top running every step without stopping. This is NOT a sprint. Just try and run every step, and repeat this three more times. Each time you run down push the pace a tiny bit.\n\nGroup 2: Find a steep hill about a 1/2 mile long. It can be road or trail. Run up to the top running every step without stopping. This is NOT a sprint. Just try and run every step, and repeat this four more times. Each time you run down push the pace a tiny bit.\n\nGroup 2.5 & 3: Find a steep hill about a mile long (it can be a little longer than that). Road or trail. Run up to the top running every step without stopping. This is NOT a sprint. Just try and run every step, and repeat this three more times. Each time you run down push the pace a tiny bit.\n\nGroup 4: Find a steep hill about a mile long (it can be a little longer than that). Run up to the top running every step without stopping. This is NOT a sprint. Just try and run every step, and repeat this four more times. Each time you run down push the pace a tiny bit.  (Arrival Time: 12:00 PM (Pacific Time (US & Canada))) ",
                    "Hills Repeats 4x1mi\nFind a steep hill about a mile long (it can be a little longer than that). Road or trail. Run up to the top running every step without stopping. This is NOT a sprint. Just try and run every step, and repeat this three more times. Each time you run down push the pace a tiny bit.",
                ),
                Exchange::new(
                    "KHraces Trail Team - SEE NOTES\nPlease do this core workout & at home workout plus runs below\nWorkouts:\n1.https://www.youtube.com/watch?v=Auo8veVyRIY&t=10s\n2. https://www.youtube.com/watch?v=ysKkAA9jK0Q&list=WL&index=19&t=25s\n\nRuns:\nGroup 1: 5 miles w/the last mile pushing the pace as hard as you can\nGroup 2 and 2.5: 7 miles w/the last mile pushing the pace as hard as you can\nGroup 3: 9 miles w/the last mile pushing the pace as hard as you can\nGroup 4: 9 miles w/the last mile pushing the pace as hard as you can  (Arrival Time: 12:00 PM (Pacific Time (US & Canada)))",
                    "Fast Finish 9mi + Workouts\n9 miles w/the last mile pushing the pace as hard as you can\n\nWorkouts:\n1. https://www.youtube.com/watch?v=Auo8veVyRIY&t=10s\n2. https://www.youtube.com/watch?v=ysKkAA9jK0Q&list=WL&index=19&t=25s",
                ),
                Exchange::new(
                    "KHraces Trail Team - Rest\n(Arrival Time: 12:00 PM (Pacific Time (US & Canada)))",
                    "Rest\nRest",
                ),
            ],
        }
    }

    /// The club's template for replies that echo a whole VEVENT block.
    pub fn event_block() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.0,
            top_p: default_top_p(),
            system_instruction: EVENT_BLOCK_INSTRUCTION.to_string(),
            examples: vec![Exchange::new(
                "BEGIN:VEVENT\r\nDESCRIPTION:Group 1: rest\\nGroup 3: 6 miles easy  (Arrival Time: 6:30 AM)\r\nDTEND;TZID=America/Los_Angeles:20250105T063000\r\nDTSTART;TZID=America/Los_Angeles:20250105T063000\r\nLOCATION:Fullerton Loop\r\nSUMMARY:KHraces Trail Team - Easy - See Notes.\r\nEND:VEVENT\r\n",
                "BEGIN:VEVENT\r\nDESCRIPTION:6 miles easy\r\nDTEND;TZID=America/Los_Angeles:20250105T063000\r\nDTSTART;TZID=America/Los_Angeles:20250105T063000\r\nLOCATION:Fullerton Loop\r\nSUMMARY:Easy 6mi\r\nEND:VEVENT\r\n",
            )],
        }
    }

    /// Builder: use a different model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Builds the full turn list: every example as a user/model pair,
    /// followed by `user_text` as the final user turn.
    pub fn conversation(&self, user_text: impl Into<String>) -> Vec<Turn> {
        self.examples
            .iter()
            .flat_map(|example| [Turn::user(&example.input), Turn::model(&example.output)])
            .chain(std::iter::once(Turn::user(user_text)))
            .collect()
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::trail_team()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_replays_examples_then_user_turn() {
        let template = PromptTemplate::trail_team();
        let turns = template.conversation("KHraces Trail Team - Easy\nGroup 3: 8 miles");

        assert_eq!(turns.len(), template.examples.len() * 2 + 1);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[1].role, Role::Model);
        assert_eq!(turns[1].text, template.examples[0].output);

        let last = turns.last().unwrap();
        assert_eq!(last.role, Role::User);
        assert_eq!(last.text, "KHraces Trail Team - Easy\nGroup 3: 8 miles");
    }

    #[test]
    fn example_replies_are_two_part() {
        for example in PromptTemplate::trail_team().examples {
            let (summary, _) = example
                .output
                .split_once('\n')
                .expect("example reply should have a description");
            assert!(!summary.is_empty());
            assert!(!summary.starts_with("KHraces"));
        }
    }

    #[test]
    fn event_block_examples_are_vevent_blocks() {
        for example in PromptTemplate::event_block().examples {
            assert!(example.output.starts_with("BEGIN:VEVENT\r\n"));
            assert!(example.output.ends_with("END:VEVENT\r\n"));
        }
    }

    #[test]
    fn sampling_defaults() {
        let template = PromptTemplate::default();
        assert_eq!(template.model, "gemini-2.5-flash-preview-04-17");
        assert_eq!(template.temperature, 0.0);
        assert_eq!(template.top_p, 0.1);
    }

    #[test]
    fn template_loads_from_json_with_defaults() {
        let json = r#"{
            "model": "gemini-2.5-pro",
            "system_instruction": "Be brief.",
            "examples": [{ "input": "a\nb", "output": "A\nB" }]
        }"#;

        let template: PromptTemplate = serde_json::from_str(json).unwrap();
        assert_eq!(template.model, "gemini-2.5-pro");
        assert_eq!(template.temperature, 0.0);
        assert_eq!(template.top_p, 0.1);
        assert_eq!(template.examples, vec![Exchange::new("a\nb", "A\nB")]);
    }
}
