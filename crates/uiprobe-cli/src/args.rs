//! CLI argument parsing with clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

const SELECTOR_HELP: &str = "Selector: #id, .Class, [attr=value], plain text, //Path[@text=\"v\"], or JSON";

/// Query and drive Android UIs from their accessibility hierarchy.
///
/// Captures the screen's view hierarchy with `uiautomator dump`, finds
/// elements with selectors, waits for them to appear, and sends input.
/// Output is JSON where it is meant to be consumed by scripts and agents.
#[derive(Debug, Parser)]
#[command(name = "uiprobe", version)]
pub struct Cli {
    /// Device serial (as listed by 'adb devices')
    #[arg(short, long, global = true, env = "ANDROID_SERIAL")]
    pub serial: Option<String>,

    /// Path to the adb executable
    #[arg(long, global = true, env = "UIPROBE_ADB", default_value = "adb")]
    pub adb: String,

    /// Read the hierarchy from a saved dump instead of a device
    #[arg(short, long, global = true, value_name = "PATH")]
    pub file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print the current UI hierarchy
    #[command(after_help = "\
Examples:
  uiprobe dump                          # Indented tree, one node per line
  uiprobe dump --visible-only           # Skip hidden subtrees
  uiprobe dump --format json            # Full snapshot as JSON
  uiprobe dump --format raw > screen.xml  # Raw dump, replay with --file")]
    Dump(DumpArgs),

    /// Find elements matching a selector
    #[command(after_help = "\
Examples:
  uiprobe find '#login'                 # By resource id (short or full)
  uiprobe find '.Button' --all          # Every node whose class contains Button
  uiprobe find '[text*=Sign]'           # Attribute contains
  uiprobe find '//ListView/TextView[2]' # Path query, 1-based position
  uiprobe find '{\"text\": {\"regex\": \"^Log\"}, \"clickable\": true}'
  uiprobe find '[\"#ok\", \"OK\"]'          # First alternative with matches wins
  uiprobe find 'OK' --within '#dialog'  # Only inside the first #dialog match")]
    Find(FindArgs),

    /// Tap an element (waits for it to appear first)
    #[command(after_help = "\
Examples:
  uiprobe tap '#login'
  uiprobe tap 'Continue' -t 5000
  uiprobe tap '#item' --hold            # Long press
  uiprobe tap --at 540 1200             # Raw coordinates")]
    Tap(TapArgs),

    /// Wait for an element to appear (or disappear)
    #[command(after_help = "\
Examples:
  uiprobe wait-for '#home_feed'         # Wait until visible
  uiprobe wait-for '.ProgressBar' --hidden   # Wait until gone
  uiprobe wait-for 'Welcome' -t 20000")]
    WaitFor(WaitForArgs),

    /// Type text into the focused field
    #[command(name = "type")]
    Type(TypeArgs),

    /// Send a key event by name or Android key code
    #[command(after_help = "\
Named keys: home, back, enter, tab, delete, menu, search, app-switch,
            volume-up, volume-down, power, dpad-up, dpad-down, dpad-left,
            dpad-right, dpad-center

Examples:
  uiprobe key back
  uiprobe key 66                        # KEYCODE_ENTER")]
    Key(KeyArgs),

    /// Swipe between two points
    #[command(after_help = "\
Examples:
  uiprobe swipe 540 1600 540 400        # Scroll content up
  uiprobe swipe 100 800 900 800 --duration 600")]
    Swipe(SwipeArgs),

    /// Show an end-to-end usage example
    Examples,
}

#[derive(Debug, clap::Args)]
pub struct DumpArgs {
    /// Output format
    #[arg(long, value_enum, default_value_t = DumpFormat::Tree)]
    pub format: DumpFormat,

    /// Leave out nodes that are not visible on screen
    #[arg(long)]
    pub visible_only: bool,

    /// Maximum display width of text values in tree output
    #[arg(long, default_value_t = 60)]
    pub width: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DumpFormat {
    /// Indented tree, one node per line
    Tree,
    /// Parsed snapshot as JSON
    Json,
    /// The dump exactly as captured
    Raw,
}

#[derive(Debug, clap::Args)]
pub struct FindArgs {
    #[arg(help = SELECTOR_HELP)]
    pub selector: String,

    /// Print every match instead of the first
    #[arg(short, long)]
    pub all: bool,

    /// Print matches as JSON
    #[arg(long)]
    pub json: bool,

    /// Only search below the first element matching this selector
    #[arg(short, long, value_name = "SELECTOR")]
    pub within: Option<String>,
}

#[derive(Debug, clap::Args)]
pub struct TapArgs {
    #[arg(help = SELECTOR_HELP, required_unless_present = "at", conflicts_with = "at")]
    pub selector: Option<String>,

    /// Tap raw coordinates instead of an element
    #[arg(long, num_args = 2, value_names = ["X", "Y"])]
    pub at: Option<Vec<i32>>,

    /// Long-press instead of tapping, optionally for this many milliseconds
    #[arg(long, value_name = "MS", num_args = 0..=1)]
    pub hold: Option<Option<u64>>,

    /// How long to wait for the element, in milliseconds
    #[arg(short, long)]
    pub timeout: Option<u64>,
}

#[derive(Debug, clap::Args)]
pub struct WaitForArgs {
    #[arg(help = SELECTOR_HELP)]
    pub selector: String,

    /// Timeout in milliseconds [default: UIPROBE_TIMEOUT_MS or 10000]
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Wait for the element to disappear instead
    #[arg(long)]
    pub hidden: bool,
}

#[derive(Debug, clap::Args)]
pub struct TypeArgs {
    /// Text to type
    pub text: String,
}

#[derive(Debug, clap::Args)]
pub struct KeyArgs {
    /// Key name (back, home, enter, ...) or numeric key code
    pub key: String,
}

#[derive(Debug, clap::Args)]
pub struct SwipeArgs {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,

    /// Gesture duration in milliseconds
    #[arg(short, long, default_value_t = 300)]
    pub duration: u64,
}

/// Resolve a key name or number to an Android key code.
pub fn parse_key_code(key: &str) -> Option<u32> {
    if let Ok(code) = key.trim().parse::<u32>() {
        return Some(code);
    }
    let normalized = key.trim().to_ascii_lowercase().replace('_', "-");
    let name = normalized.strip_prefix("keycode-").unwrap_or(&normalized);
    let code = match name {
        "home" => 3,
        "back" => 4,
        "dpad-up" => 19,
        "dpad-down" => 20,
        "dpad-left" => 21,
        "dpad-right" => 22,
        "dpad-center" => 23,
        "volume-up" => 24,
        "volume-down" => 25,
        "power" => 26,
        "tab" => 61,
        "space" => 62,
        "enter" => 66,
        "delete" | "backspace" => 67,
        "menu" => 82,
        "search" => 84,
        "escape" => 111,
        "app-switch" => 187,
        _ => return None,
    };
    Some(code)
}

/// End-to-end example text for the `examples` command.
pub const EXAMPLES_TEXT: &str = r#"End-to-end example: Log in to an app

# 1. See what is on screen
uiprobe dump --visible-only

# 2. Wait for the login form and fill it in
uiprobe wait-for '#username'
uiprobe tap '#username'
uiprobe type 'demo@example.com'
uiprobe tap '#password'
uiprobe type 'hunter2'

# 3. Submit, matching the button by text and state
uiprobe tap '{"text": {"regex": "^Log ?in$"}, "clickable": true}'

# 4. Wait for the spinner to go away and the home screen to show
uiprobe wait-for '.ProgressBar' --hidden -t 20000
uiprobe wait-for '//RecyclerView/*[1]'

# 5. Go back
uiprobe key back

# Work offline against a saved dump:
uiprobe dump --format raw > screen.xml
uiprobe --file screen.xml find '.Button' --all --json
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_flags_work_after_subcommand() {
        let cli = Cli::parse_from(["uiprobe", "find", "#ok", "--serial", "emulator-5554", "--all"]);
        assert_eq!(cli.serial.as_deref(), Some("emulator-5554"));
        match cli.command {
            Commands::Find(args) => {
                assert_eq!(args.selector, "#ok");
                assert!(args.all);
                assert!(!args.json);
                assert!(args.within.is_none());
            }
            _ => panic!("Expected find command"),
        }

        let cli = Cli::parse_from(["uiprobe", "find", "OK", "--within", "#dialog"]);
        match cli.command {
            Commands::Find(args) => assert_eq!(args.within.as_deref(), Some("#dialog")),
            _ => panic!("Expected find command"),
        }
    }

    #[test]
    fn test_tap_takes_selector_or_coordinates() {
        let cli = Cli::parse_from(["uiprobe", "tap", "--at", "10", "20"]);
        match cli.command {
            Commands::Tap(args) => {
                assert_eq!(args.at, Some(vec![10, 20]));
                assert!(args.selector.is_none());
            }
            _ => panic!("Expected tap command"),
        }

        assert!(Cli::try_parse_from(["uiprobe", "tap"]).is_err());
        assert!(Cli::try_parse_from(["uiprobe", "tap", "#ok", "--at", "1", "2"]).is_err());
    }

    #[test]
    fn test_hold_value_is_optional() {
        let cli = Cli::parse_from(["uiprobe", "tap", "#item", "--hold"]);
        match cli.command {
            Commands::Tap(args) => assert_eq!(args.hold, Some(None)),
            _ => panic!("Expected tap command"),
        }
        let cli = Cli::parse_from(["uiprobe", "tap", "#item", "--hold", "2500"]);
        match cli.command {
            Commands::Tap(args) => assert_eq!(args.hold, Some(Some(2500))),
            _ => panic!("Expected tap command"),
        }
    }

    #[test]
    fn test_swipe_takes_four_coordinates_and_duration() {
        let cli = Cli::parse_from(["uiprobe", "swipe", "1", "2", "3", "4", "--duration", "900"]);
        match cli.command {
            Commands::Swipe(args) => {
                assert_eq!((args.x1, args.y1, args.x2, args.y2), (1, 2, 3, 4));
                assert_eq!(args.duration, 900);
            }
            _ => panic!("Expected swipe command"),
        }
    }

    #[test]
    fn test_wait_for_flags() {
        let cli = Cli::parse_from(["uiprobe", "wait-for", ".ProgressBar", "--hidden", "-t", "500"]);
        match cli.command {
            Commands::WaitFor(args) => {
                assert!(args.hidden);
                assert_eq!(args.timeout, Some(500));
            }
            _ => panic!("Expected wait-for command"),
        }
    }

    #[test]
    fn test_dump_defaults_to_tree() {
        let cli = Cli::parse_from(["uiprobe", "--file", "screen.xml", "dump"]);
        assert_eq!(cli.file, Some(PathBuf::from("screen.xml")));
        match cli.command {
            Commands::Dump(args) => {
                assert_eq!(args.format, DumpFormat::Tree);
                assert_eq!(args.width, 60);
            }
            _ => panic!("Expected dump command"),
        }
    }

    #[test]
    fn test_key_names_and_codes() {
        assert_eq!(parse_key_code("back"), Some(4));
        assert_eq!(parse_key_code("KEYCODE_ENTER"), Some(66));
        assert_eq!(parse_key_code("App_Switch"), Some(187));
        assert_eq!(parse_key_code("66"), Some(66));
        assert_eq!(parse_key_code("warp"), None);
    }
}
