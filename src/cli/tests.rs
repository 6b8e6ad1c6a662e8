#[cfg(test)]
mod tests {
    use crate::cli::{CliApp, Commands, ParseError, ReaderCommand, StatusDisplay};
    use crate::audio::transport::TransportState;
    use crate::models::NarrationSnapshot;
    use clap::Parser;
    use std::path::PathBuf;

    #[test]
    fn test_parse_command_basic_controls() {
        assert_eq!(CliApp::parse_command("play").unwrap(), ReaderCommand::Play);
        assert_eq!(CliApp::parse_command("resume").unwrap(), ReaderCommand::Play);
        assert_eq!(CliApp::parse_command("pause").unwrap(), ReaderCommand::Pause);
        assert_eq!(CliApp::parse_command("stop").unwrap(), ReaderCommand::Stop);
        assert_eq!(CliApp::parse_command("status").unwrap(), ReaderCommand::Status);
        assert_eq!(CliApp::parse_command("watch").unwrap(), ReaderCommand::Watch);
    }

    #[test]
    fn test_parse_command_navigation() {
        assert_eq!(CliApp::parse_command("next").unwrap(), ReaderCommand::Next);
        assert_eq!(CliApp::parse_command("n").unwrap(), ReaderCommand::Next);
        assert_eq!(CliApp::parse_command("prev").unwrap(), ReaderCommand::Prev);
        assert_eq!(CliApp::parse_command("previous").unwrap(), ReaderCommand::Prev);
        assert_eq!(
            CliApp::parse_command("page 4").unwrap(),
            ReaderCommand::Page { number: 4 }
        );
        assert_eq!(
            CliApp::parse_command("  GOTO   2  ").unwrap(),
            ReaderCommand::Page { number: 2 }
        );
    }

    #[test]
    fn test_parse_command_page_errors() {
        match CliApp::parse_command("page") {
            Err(ParseError::MissingArgument { command, argument }) => {
                assert_eq!(command, "page");
                assert_eq!(argument, "number");
            }
            other => panic!("Expected MissingArgument, got {:?}", other),
        }

        for bad in ["page 0", "page -1", "page three"] {
            assert!(
                matches!(CliApp::parse_command(bad), Err(ParseError::InvalidArgument { .. })),
                "'{}' should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_parse_command_general() {
        assert_eq!(CliApp::parse_command("quit").unwrap(), ReaderCommand::Quit);
        assert_eq!(CliApp::parse_command("exit").unwrap(), ReaderCommand::Quit);
        assert!(matches!(CliApp::parse_command("help"), Err(ParseError::HelpRequested)));
        assert!(matches!(CliApp::parse_command(""), Err(ParseError::EmptyCommand)));
        assert!(matches!(CliApp::parse_command("   "), Err(ParseError::EmptyCommand)));

        match CliApp::parse_command("dance") {
            Err(ParseError::UnknownCommand { command }) => assert_eq!(command, "dance"),
            other => panic!("Expected UnknownCommand, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_error_display() {
        let error = ParseError::InvalidArgument {
            argument: "page number".to_string(),
            value: "0".to_string(),
            expected: "a page number starting at 1".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid argument page number: got '0', expected a page number starting at 1"
        );
    }

    #[test]
    fn test_cli_arguments() {
        let app = CliApp::try_parse_from([
            "narrate",
            "story.json",
            "--silent",
            "--device",
            "USB DAC",
            "--page",
            "3",
        ])
        .unwrap();

        assert!(app.command.is_none());
        assert_eq!(app.story, Some(PathBuf::from("story.json")));
        assert!(app.silent);
        assert_eq!(app.device.as_deref(), Some("USB DAC"));
        assert_eq!(app.start_page(), 2);
        assert!(app.config.is_none());
    }

    #[test]
    fn test_cli_defaults_and_devices() {
        let app = CliApp::try_parse_from(["narrate", "story.json"]).unwrap();
        assert_eq!(app.start_page(), 0);
        assert!(!app.silent);

        let app = CliApp::try_parse_from(["narrate", "devices"]).unwrap();
        assert!(matches!(app.command, Some(Commands::Devices)));

        assert!(CliApp::try_parse_from(["narrate", "story.json", "--page", "0"]).is_err());
    }

    #[test]
    fn test_expand_path() {
        let expanded = CliApp::expand_path("~/stories/luna.json");
        if dirs::home_dir().is_some() {
            assert!(!expanded.to_string_lossy().starts_with('~'));
        }
        assert!(expanded.to_string_lossy().ends_with("stories/luna.json"));

        assert_eq!(
            CliApp::expand_path("/absolute/luna.json"),
            PathBuf::from("/absolute/luna.json")
        );
        assert_eq!(CliApp::expand_path("relative.json"), PathBuf::from("relative.json"));
    }

    #[test]
    fn test_status_display_does_not_panic() {
        let mut snapshot = NarrationSnapshot {
            state: TransportState::Playing,
            playhead: 12.5,
            duration: 40.0,
            narrated_page: Some(0),
        };
        StatusDisplay::display_position_update(&snapshot, true);

        snapshot.state = TransportState::Loading;
        StatusDisplay::display_position_update(&snapshot, true);

        snapshot.duration = 0.0;
        StatusDisplay::display_position_update(&snapshot, false);
    }
}
