//! REPL – the interactive `armbridge>` shell.
//!
//! Supported slash-commands:
//!   /help                          – show this list
//!   /types                         – registered robot types
//!   /ports                         – serial ports on this machine
//!   /scan                          – look for network controllers
//!   /connect [type] [endpoint]     – connect (defaults from config)
//!   /disconnect                    – return to idle
//!   /status                        – connection, program and position
//!   /home                          – move to the home pose
//!   /move x y z r [speed]          – Cartesian move
//!   /joint j1 j2 j3 j4 [j5 j6] [speed]
//!   /jog <axis> <delta>            – relative move on x, y, z or r
//!   /tool on|off [name]            – activate or release the end effector
//!   /gripper open|close
//!   /cmd <name> [json]             – ad-hoc command
//!   /run <program.json>            – run a program in the background
//!   /stop                          – emergency stop
//!   /quit | /exit

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use armbridge_kernel::{JogAxis, RobotManager, list_serial_ports, scan_network};
use armbridge_types::{CartesianTarget, DEFAULT_SPEED, JointTarget, Program, RobotStatus};
use colored::Colorize;
use serde_json::Value;
use tokio::runtime::Handle;
use tracing::debug;

use crate::config::Config;

/// One parsed shell line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Types,
    Ports,
    Scan,
    Connect {
        robot_type: Option<String>,
        endpoint: Option<String>,
    },
    Disconnect,
    Status,
    Home,
    Move {
        target: CartesianTarget,
        speed: f64,
    },
    Joint {
        target: JointTarget,
        speed: f64,
    },
    Jog {
        axis: JogAxis,
        delta: f64,
    },
    Tool {
        active: bool,
        name: Option<String>,
    },
    Gripper {
        closed: bool,
    },
    Cmd {
        name: String,
        params: Value,
    },
    Run {
        path: PathBuf,
    },
    Stop,
    Quit,
}

/// Parse one line of input.  The error is a message for the operator.
pub fn parse(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let head = words.next().unwrap_or_default();
    let args: Vec<&str> = words.collect();

    match head {
        "/help" => Ok(Command::Help),
        "/types" => Ok(Command::Types),
        "/ports" => Ok(Command::Ports),
        "/scan" => Ok(Command::Scan),
        "/connect" => Ok(Command::Connect {
            robot_type: args.first().map(|s| s.to_string()),
            endpoint: args.get(1).map(|s| s.to_string()),
        }),
        "/disconnect" => Ok(Command::Disconnect),
        "/status" => Ok(Command::Status),
        "/home" => Ok(Command::Home),
        "/move" => {
            let n = numbers(&args)?;
            match n.as_slice() {
                [x, y, z, r] => Ok(Command::Move {
                    target: CartesianTarget::new(*x, *y, *z, *r),
                    speed: DEFAULT_SPEED,
                }),
                [x, y, z, r, speed] => Ok(Command::Move {
                    target: CartesianTarget::new(*x, *y, *z, *r),
                    speed: *speed,
                }),
                _ => Err("usage: /move x y z r [speed]".to_string()),
            }
        }
        "/joint" => {
            let n = numbers(&args)?;
            let (target, speed) = match n.as_slice() {
                [a, b, c, d] => (JointTarget::new(*a, *b, *c, *d), DEFAULT_SPEED),
                [a, b, c, d, s] => (JointTarget::new(*a, *b, *c, *d), *s),
                [a, b, c, d, e, f] => (
                    JointTarget::new(*a, *b, *c, *d).with_wrist(*e, *f),
                    DEFAULT_SPEED,
                ),
                [a, b, c, d, e, f, s] => {
                    (JointTarget::new(*a, *b, *c, *d).with_wrist(*e, *f), *s)
                }
                _ => return Err("usage: /joint j1 j2 j3 j4 [j5 j6] [speed]".to_string()),
            };
            Ok(Command::Joint { target, speed })
        }
        "/jog" => match args.as_slice() {
            [axis, delta] => Ok(Command::Jog {
                axis: axis.parse().map_err(|e| format!("{e}"))?,
                delta: number(delta)?,
            }),
            _ => Err("usage: /jog <x|y|z|r> <delta>".to_string()),
        },
        "/tool" => match args.as_slice() {
            [state, rest @ ..] if rest.len() <= 1 => Ok(Command::Tool {
                active: on_off(state)?,
                name: rest.first().map(|s| s.to_string()),
            }),
            _ => Err("usage: /tool on|off [name]".to_string()),
        },
        "/gripper" => match args.as_slice() {
            ["close"] | ["closed"] => Ok(Command::Gripper { closed: true }),
            ["open"] => Ok(Command::Gripper { closed: false }),
            _ => Err("usage: /gripper open|close".to_string()),
        },
        "/cmd" => {
            let Some(name) = args.first() else {
                return Err("usage: /cmd <name> [json]".to_string());
            };
            let rest = line
                .trim()
                .splitn(3, char::is_whitespace)
                .nth(2)
                .unwrap_or("")
                .trim();
            let params = if rest.is_empty() {
                Value::Object(Default::default())
            } else {
                serde_json::from_str(rest).map_err(|e| format!("invalid JSON params: {e}"))?
            };
            Ok(Command::Cmd {
                name: name.to_string(),
                params,
            })
        }
        "/run" => match args.as_slice() {
            [path] => Ok(Command::Run {
                path: PathBuf::from(*path),
            }),
            _ => Err("usage: /run <program.json>".to_string()),
        },
        "/stop" => Ok(Command::Stop),
        "/quit" | "/exit" => Ok(Command::Quit),
        other => Err(format!("Unknown command: '{other}'")),
    }
}

fn number(s: &str) -> Result<f64, String> {
    s.parse::<f64>()
        .map_err(|_| format!("'{s}' is not a number"))
}

fn numbers(args: &[&str]) -> Result<Vec<f64>, String> {
    args.iter().map(|a| number(a)).collect()
}

fn on_off(s: &str) -> Result<bool, String> {
    match s {
        "on" | "activate" => Ok(true),
        "off" | "deactivate" => Ok(false),
        other => Err(format!("expected on or off, got '{other}'")),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Loop
// ─────────────────────────────────────────────────────────────────────────────

/// Entry point for the interactive REPL.
///
/// Returns on `/quit`, `/exit` or end of input.  Robot commands block the
/// prompt; `/run` does not.
pub fn run(runtime: Handle, manager: Arc<RobotManager>, config: Config) {
    run_with(io::stdin().lock(), runtime, manager, config);
}

fn run_with<R: BufRead>(
    mut input: R,
    runtime: Handle,
    manager: Arc<RobotManager>,
    config: Config,
) {
    let mut stdout = io::stdout();
    let shell = Shell {
        runtime,
        manager,
        config,
    };

    loop {
        print!("{} ", "armbridge>".bold().cyan());
        stdout.flush().ok();

        let mut line = String::new();
        match input.read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match parse(line) {
            Ok(Command::Quit) => {
                shell.runtime.block_on(shell.manager.disconnect());
                println!("{}", "Goodbye.".green());
                break;
            }
            Ok(command) => {
                debug!(?command, "shell command");
                shell.dispatch(command);
            }
            Err(msg) => println!(
                "{} Type {} for available commands.",
                msg.red(),
                "/help".bold()
            ),
        }
    }
}

struct Shell {
    runtime: Handle,
    manager: Arc<RobotManager>,
    config: Config,
}

impl Shell {
    fn dispatch(&self, command: Command) {
        let manager = &self.manager;
        match command {
            Command::Help => cmd_help(),
            Command::Types => {
                println!("{}", "Robot types".bold().underline());
                for d in manager.list_robot_types() {
                    println!("  {:<10} {} – {}", d.id.bold(), d.name, d.description.dimmed());
                }
            }
            Command::Ports => match list_serial_ports() {
                Ok(ports) if ports.is_empty() => println!("  {}", "no serial ports found".dimmed()),
                Ok(ports) => {
                    for p in ports {
                        println!(
                            "  {} {} {}",
                            p.path.bold(),
                            p.manufacturer.unwrap_or_default(),
                            p.vendor_id
                                .zip(p.product_id)
                                .map(|(vid, pid)| format!("[{vid}:{pid}]"))
                                .unwrap_or_default()
                                .dimmed()
                        );
                    }
                }
                Err(e) => println!("{}: {}", "Port listing failed".red(), e),
            },
            Command::Scan => {
                for robot in self.runtime.block_on(scan_network()) {
                    println!("  {:<15} {:<10} {}", robot.ip.bold(), robot.robot_type, robot.name);
                }
            }
            Command::Connect {
                robot_type,
                endpoint,
            } => {
                let robot_type = robot_type.unwrap_or_else(|| self.config.default_robot_type.clone());
                let endpoint = endpoint.unwrap_or_else(|| self.config.default_endpoint.clone());
                let adapter_config = self.config.adapter(&robot_type);
                match self
                    .runtime
                    .block_on(manager.connect(&robot_type, &endpoint, &adapter_config))
                {
                    Ok(status) => {
                        println!("{} {}", "✓ Connected to".green(), robot_type.bold());
                        print_status(&status);
                    }
                    Err(e) => report(e),
                }
            }
            Command::Disconnect => {
                self.runtime.block_on(manager.disconnect());
                println!("{}", "✓ Disconnected".green());
            }
            Command::Status => print_status(&manager.status()),
            Command::Home => self.motion(manager.home()),
            Command::Move { target, speed } => self.motion(manager.move_cartesian(target, speed)),
            Command::Joint { target, speed } => self.motion(manager.move_joint(target, speed)),
            Command::Jog { axis, delta } => self.motion(manager.jog(axis, delta, DEFAULT_SPEED)),
            Command::Tool { active, name } => {
                let params = match name {
                    Some(tool) => serde_json::json!({ "tool": tool }),
                    None => serde_json::json!({}),
                };
                let command = if active {
                    "tool_activate"
                } else {
                    "tool_deactivate"
                };
                self.execute(command, &params);
            }
            Command::Gripper { closed } => {
                match self.runtime.block_on(manager.set_end_effector(closed)) {
                    Ok(()) => println!(
                        "{} {}",
                        "✓ Gripper".green(),
                        if closed { "closed" } else { "open" }
                    ),
                    Err(e) => report(e),
                }
            }
            Command::Cmd { name, params } => self.execute(&name, &params),
            Command::Run { path } => self.run_program(path),
            Command::Stop => {
                self.runtime.block_on(manager.emergency_stop());
                println!("{}", "■ Emergency stop sent".red().bold());
            }
            Command::Quit => {}
        }
    }

    fn motion<F>(&self, fut: F)
    where
        F: std::future::Future<Output = Result<armbridge_types::Position, armbridge_types::BridgeError>>,
    {
        match self.runtime.block_on(fut) {
            Ok(pos) => println!(
                "{} x={:.1} y={:.1} z={:.1} r={:.1}",
                "✓".green(),
                pos.x,
                pos.y,
                pos.z,
                pos.r
            ),
            Err(e) => report(e),
        }
    }

    fn execute(&self, command: &str, params: &Value) {
        match self.runtime.block_on(self.manager.execute(command, params)) {
            Ok(outcome) => {
                println!("{} {}", "✓".green(), outcome.message);
                if let Some(result) = outcome.result {
                    println!("  {}", result.to_string().dimmed());
                }
            }
            Err(e) => report(e),
        }
    }

    fn run_program(&self, path: PathBuf) {
        let program = match load_program(&path) {
            Ok(p) => p,
            Err(msg) => {
                println!("{}: {}", "Program error".red(), msg);
                return;
            }
        };
        println!(
            "  Running {} ({} steps) – {} to abort",
            program.name.bold(),
            program.commands.len(),
            "/stop".bold()
        );
        let manager = Arc::clone(&self.manager);
        self.runtime.spawn(async move {
            match manager.execute_program(&program).await {
                Ok(report) => println!(
                    "\n{} {} finished ({} steps)",
                    "✓".green(),
                    report.name.bold(),
                    report.steps_completed
                ),
                Err(e) => println!("\n{}: {}", "Program stopped".red(), e),
            }
        });
    }
}

/// Read a program file.  The name defaults to the file stem.
pub fn load_program(path: &std::path::Path) -> Result<Program, String> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    let mut program: Program =
        serde_json::from_str(&raw).map_err(|e| format!("Failed to parse program: {}", e))?;
    if program.name.is_empty() {
        program.name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "program".to_string());
    }
    Ok(program)
}

// ─────────────────────────────────────────────────────────────────────────────
// Output
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_help() {
    println!();
    println!("{}", "armbridge Commands".bold().underline());
    let rows = [
        ("/types", "list registered robot types"),
        ("/ports", "list serial ports"),
        ("/scan", "scan the network for controllers"),
        ("/connect [type] [endpoint]", "connect a robot"),
        ("/disconnect", "disconnect the robot"),
        ("/status", "show connection and position"),
        ("/home", "move to the home pose"),
        ("/move x y z r [speed]", "Cartesian move"),
        ("/joint j1 j2 j3 j4 [j5 j6] [speed]", "joint move"),
        ("/jog <axis> <delta>", "relative move on x, y, z or r"),
        ("/tool on|off [name]", "activate or release the end effector"),
        ("/gripper open|close", "drive the gripper output"),
        ("/cmd <name> [json]", "send an ad-hoc command"),
        ("/run <program.json>", "run a program in the background"),
        ("/stop", "EMERGENCY STOP"),
        ("/quit  /exit", "disconnect and exit"),
    ];
    for (usage, what) in rows {
        println!("  {:<36} – {}", usage.bold().cyan(), what);
    }
    println!();
}

fn print_status(status: &RobotStatus) {
    let link = if status.connected {
        "connected".green()
    } else {
        "disconnected".red()
    };
    println!(
        "  {} {}{}",
        status.robot_type.as_deref().unwrap_or("no robot").bold(),
        link,
        if status.executing {
            format!(" {}", "(program running)".yellow())
        } else {
            String::new()
        }
    );
    let p = &status.position;
    println!(
        "  x={:.1} y={:.1} z={:.1} r={:.1}  j=[{:.1}, {:.1}, {:.1}, {:.1}, {:.1}, {:.1}]",
        p.x, p.y, p.z, p.r, p.j1, p.j2, p.j3, p.j4, p.j5, p.j6
    );
}

fn report(e: armbridge_types::BridgeError) {
    println!("{}: {}", "Error".red(), e);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn move_speed_is_optional() {
        assert_eq!(
            parse("/move 100 0 150 0").unwrap(),
            Command::Move {
                target: CartesianTarget::new(100.0, 0.0, 150.0, 0.0),
                speed: DEFAULT_SPEED
            }
        );
        assert_eq!(
            parse("/move 1 2 3 4 80").unwrap(),
            Command::Move {
                target: CartesianTarget::new(1.0, 2.0, 3.0, 4.0),
                speed: 80.0
            }
        );
        assert!(parse("/move 1 2 three 4").is_err());
        assert!(parse("/move 1 2").is_err());
    }

    #[test]
    fn joint_arity_selects_wrist_and_speed() {
        let Command::Joint { target, speed } = parse("/joint 1 2 3 4 30").unwrap() else {
            panic!("not a joint command");
        };
        assert_eq!((target.j5, speed), (None, 30.0));

        let Command::Joint { target, speed } = parse("/joint 1 2 3 4 5 6").unwrap() else {
            panic!("not a joint command");
        };
        assert_eq!((target.j5, target.j6, speed), (Some(5.0), Some(6.0), DEFAULT_SPEED));

        let Command::Joint { speed, .. } = parse("/joint 1 2 3 4 5 6 70").unwrap() else {
            panic!("not a joint command");
        };
        assert_eq!(speed, 70.0);
    }

    #[test]
    fn connect_arguments_are_optional() {
        assert_eq!(
            parse("/connect").unwrap(),
            Command::Connect {
                robot_type: None,
                endpoint: None
            }
        );
        assert_eq!(
            parse("/connect abb 192.168.125.1").unwrap(),
            Command::Connect {
                robot_type: Some("abb".to_string()),
                endpoint: Some("192.168.125.1".to_string())
            }
        );
    }

    #[test]
    fn cmd_keeps_json_with_spaces() {
        assert_eq!(
            parse(r#"/cmd blink {"times": 3, "led": "red"}"#).unwrap(),
            Command::Cmd {
                name: "blink".to_string(),
                params: json!({ "times": 3, "led": "red" })
            }
        );
        assert_eq!(
            parse("/cmd ping").unwrap(),
            Command::Cmd {
                name: "ping".to_string(),
                params: json!({})
            }
        );
        assert!(parse("/cmd blink {oops").is_err());
    }

    #[test]
    fn tool_gripper_and_jog() {
        assert_eq!(
            parse("/tool on laser").unwrap(),
            Command::Tool {
                active: true,
                name: Some("laser".to_string())
            }
        );
        assert_eq!(parse("/gripper open").unwrap(), Command::Gripper { closed: false });
        assert_eq!(
            parse("/jog z -10").unwrap(),
            Command::Jog {
                axis: JogAxis::Z,
                delta: -10.0
            }
        );
        assert!(parse("/jog w 5").is_err());
    }

    #[test]
    fn quit_disconnects_and_ends_the_loop() {
        let runtime = tokio::runtime::Runtime::new().expect("runtime");
        let manager = Arc::new(RobotManager::with_builtin_adapters());
        let input = io::Cursor::new("/connect custom\n/quit\n/connect custom\n");

        run_with(input, runtime.handle().clone(), Arc::clone(&manager), Config::default());
        assert_eq!(manager.status(), RobotStatus::idle());
    }

    #[test]
    fn unknown_command_is_reported() {
        assert_eq!(parse("/dance").unwrap_err(), "Unknown command: '/dance'");
    }

    #[test]
    fn program_name_defaults_to_file_stem() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("square.json");
        std::fs::write(
            &path,
            r#"{ "commands": [ { "type": "home" }, { "type": "wait", "params": { "duration": 5 } } ] }"#,
        )
        .expect("write");
        let program = load_program(&path).expect("load");
        assert_eq!(program.name, "square");
        assert_eq!(program.commands.len(), 2);
    }
}
