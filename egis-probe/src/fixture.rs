use std::{collections::HashSet, fs, path::{Path, PathBuf}};

use serde::Deserialize;

use crate::classify::{Thresholds, Tier};
use crate::error::{Error, Result};
use crate::sequence::Sequence;
use crate::usb::SessionConfig;

/// A command table file: where the device is, how to grade captures, and
/// the named command sequences to replay.
///
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Fixture {
    #[serde(default)]
    pub device: SessionConfig,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default = "Fixture::default_save_tier")]
    pub save_tier: Tier,
    pub sequences: Vec<Sequence>,
}

impl Fixture {
    fn default_save_tier() -> Tier {
        Tier::Good
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        Self::parse(&text, path)
    }

    /// `origin` only labels errors.
    pub fn parse(text: &str, origin: &Path) -> Result<Self> {
        let fixture: Fixture = serde_yaml::from_str(text).map_err(|e| Error::Fixture {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })?;

        fixture.validate().map_err(|message| Error::Fixture {
            path: origin.to_path_buf(),
            message,
        })?;

        Ok(fixture)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        let mut names = HashSet::new();

        for sequence in &self.sequences {
            if !names.insert(sequence.name.as_str()) {
                return Err(format!("duplicate sequence {:?}", sequence.name));
            }
            if sequence.commands.is_empty() {
                return Err(format!("sequence {:?} has no commands", sequence.name));
            }
            if sequence.repeat == 0 {
                return Err(format!("sequence {:?}: repeat must be > 0", sequence.name));
            }
            if sequence.timeout_ms == 0 {
                return Err(format!("sequence {:?}: timeout_ms must be > 0", sequence.name));
            }

            for step in &sequence.commands {
                if step.response_length == 0 {
                    return Err(format!("{:?}/{:?}: response_length must be > 0", sequence.name, step.name));
                }
                if step.timeout_ms == Some(0) {
                    return Err(format!("{:?}/{:?}: timeout_ms must be > 0", sequence.name, step.name));
                }
            }
        }

        Ok(())
    }

    pub fn sequence(&self, name: &str) -> Option<&Sequence> {
        self.sequences.iter().find(|s| s.name == name)
    }

    pub fn sequence_names(&self) -> impl Iterator<Item = &str> {
        self.sequences.iter().map(|s| s.name.as_str())
    }
}

/// Default location of the EH575 command tables, relative to the workspace.
pub fn default_path() -> PathBuf {
    PathBuf::from("eh576/fixtures/eh575.yaml")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
device:
  product_id: 0x0576
thresholds:
  excellent: { non_zero_ratio: 0.30, distinct_ratio: 0.40 }
  good:      { non_zero_ratio: 0.15, distinct_ratio: 0.20 }
  fair:      { non_zero_ratio: 0.05, distinct_ratio: 0.10 }
save_tier: fair
sequences:
  - name: background
    delay_ms: 0
    commands:
      - name: init 1
        frame: "45 47 49 53 60 00 fc"
        response_length: 7
      - name: background capture
        frame: "45 47 49 53 73 14 ec"
        response_length: 5356
        capture: true
        timeout_ms: 3000
  - name: repeat
    repeat: 10
    commands:
      - name: finger
        frame: "45 47 49 53 64 14 ec"
        response_length: 5356
        capture: true
        gate: "Place your finger on the sensor"
"#;

    fn parse(text: &str) -> Result<Fixture> {
        Fixture::parse(text, Path::new("test.yaml"))
    }

    #[test]
    fn parse_sample() {
        let fixture = parse(SAMPLE).unwrap();

        assert_eq!(fixture.device.product_id, 0x0576);
        assert_eq!(fixture.thresholds, Thresholds::adaptive());
        assert_eq!(fixture.save_tier, Tier::Fair);
        assert_eq!(fixture.sequence_names().collect::<Vec<_>>(), vec!["background", "repeat"]);

        let background = fixture.sequence("background").unwrap();
        assert_eq!(background.delay_ms, 0);
        assert_eq!(background.timeout_ms, 2000);
        assert_eq!(background.commands[0].frame.as_bytes(), &[0x45, 0x47, 0x49, 0x53, 0x60, 0x00, 0xfc]);
        assert!(!background.commands[0].capture);
        assert_eq!(background.commands[1].timeout_ms, Some(3000));

        let repeat = fixture.sequence("repeat").unwrap();
        assert_eq!(repeat.repeat, 10);
        assert_eq!(repeat.commands[0].gate.as_deref(), Some("Place your finger on the sensor"));
        assert_eq!(background.commands[1].gate, None);
        assert!(fixture.sequence("missing").is_none());
    }

    #[test]
    fn defaults() {
        let fixture = parse("sequences: []").unwrap();
        assert_eq!(fixture.device, SessionConfig::default());
        assert_eq!(fixture.thresholds, Thresholds::standard());
        assert_eq!(fixture.save_tier, Tier::Good);
    }

    #[test]
    fn bad_frame_is_reported() {
        let text = r#"
sequences:
  - name: broken
    commands:
      - name: typo
        frame: "45 47 4z"
"#;
        match parse(text) {
            Err(Error::Fixture { path, message }) => {
                assert_eq!(path, Path::new("test.yaml"));
                assert!(message.contains("4z"), "{message}");
                assert!(message.contains("line 6 column"), "{message}");
            },
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn inverted_thresholds_are_rejected() {
        let text = r#"
thresholds:
  excellent: { non_zero_ratio: 0.10 }
  good:      { non_zero_ratio: 0.20 }
  fair:      { non_zero_ratio: 0.05 }
sequences: []
"#;
        assert!(matches!(parse(text), Err(Error::Fixture { .. })));
    }

    #[test]
    fn validation() {
        let duplicate = r#"
sequences:
  - name: a
    commands: [{ name: x, frame: "01" }]
  - name: a
    commands: [{ name: y, frame: "02" }]
"#;
        assert!(matches!(parse(duplicate), Err(Error::Fixture { .. })));

        let empty = "sequences: [{ name: a, commands: [] }]";
        assert!(matches!(parse(empty), Err(Error::Fixture { .. })));

        let zero_length = r#"sequences: [{ name: a, commands: [{ name: x, frame: "01", response_length: 0 }] }]"#;
        assert!(matches!(parse(zero_length), Err(Error::Fixture { .. })));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let text = r#"sequences: [{ name: a, commands: [{ name: x, frame: "01", lenght: 7 }] }]"#;
        assert!(matches!(parse(text), Err(Error::Fixture { .. })));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sensor.yaml");
        std::fs::write(&path, SAMPLE).unwrap();

        let fixture = Fixture::load(&path).unwrap();
        assert_eq!(fixture.sequences.len(), 2);

        let missing = Fixture::load(dir.path().join("missing.yaml"));
        assert!(matches!(missing, Err(Error::Io(_))));
    }

    #[test]
    fn bundled_fixture_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../eh576/fixtures/eh575.yaml");
        let fixture = Fixture::load(path).unwrap();

        let pre_init = fixture.sequence("pre-init").unwrap();
        assert_eq!(pre_init.commands.len(), 29);
        let post_init = fixture.sequence("post-init").unwrap();
        assert_eq!(post_init.commands.len(), 18);
        let repeat = fixture.sequence("repeat").unwrap();
        assert_eq!(repeat.commands.len(), 9);

        for sequence in &fixture.sequences {
            for step in &sequence.commands {
                assert!(step.frame.has_request_magic(), "{}/{}", sequence.name, step.name);
            }
        }
    }
}
