//! Zuni vault rule tool
//!
//! Command-line entry point for inspecting schemas and encoding vault rules

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use zuni_vault_rules::schema::codec::parse_address;
use zuni_vault_rules::{
    describe_rules, encode_rules, parse_schema, BatchError, FieldInput, RuleInputs, SchemaUid,
    VaultConfig,
};

#[derive(Parser, Debug)]
#[command(name = "zuni-rules", version, about = "Parse attestation schemas and encode vault rules")]
struct Cli {
    /// JSON config file (defaults come from the environment)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the rules a schema declares
    Parse { schema: String },

    /// Validate rule inputs and print the contract arrays
    Encode {
        schema: String,
        /// Rule input as `name=OP:value`, e.g. `score=GE:100` or `note=NONE`
        #[arg(long = "rule", value_name = "NAME=OP:VALUE")]
        rules: Vec<String>,
    },

    /// Decode stored operators and thresholds against their schema
    Describe {
        schema: String,
        /// Comma-separated operator codes
        #[arg(long, value_delimiter = ',')]
        ops: Vec<u8>,
        /// Comma-separated `0x` thresholds
        #[arg(long, value_delimiter = ',')]
        thresholds: Vec<String>,
    },

    /// Compute the registry UID of a schema
    Uid {
        schema: String,
        /// Resolver address (defaults to RESOLVER_ADDRESS)
        #[arg(long)]
        resolver: Option<String>,
        #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
        revocable: bool,
    },
}

fn parse_rule_arg(arg: &str) -> Result<(String, FieldInput), String> {
    let (name, rest) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=OP:VALUE, got {:?}", arg))?;
    let (op, value) = rest.split_once(':').unwrap_or((rest, ""));
    Ok((name.trim().to_string(), FieldInput::new(op.trim(), value)))
}

fn parse_hex_arg(arg: &str) -> Result<Vec<u8>, String> {
    let digits = arg.trim().strip_prefix("0x").unwrap_or(arg.trim());
    hex::decode(digits).map_err(|e| format!("invalid threshold {:?}: {}", arg, e))
}

fn load_config(path: Option<&PathBuf>) -> Result<VaultConfig, String> {
    match path {
        Some(path) => VaultConfig::from_file(path),
        None => VaultConfig::from_env(),
    }
    .map_err(|e| e.to_string())
}

fn run(cli: Cli) -> Result<serde_json::Value, String> {
    match cli.command {
        Command::Parse { schema } => {
            let rules = parse_schema(&schema);
            serde_json::to_value(rules).map_err(|e| e.to_string())
        }

        Command::Encode { schema, rules } => {
            let inputs = rules
                .iter()
                .map(|arg| parse_rule_arg(arg))
                .collect::<Result<RuleInputs, String>>()?;

            match encode_rules(&parse_schema(&schema), &inputs) {
                Ok(encoded) => Ok(serde_json::json!({
                    "operators": encoded.operators,
                    "thresholds": encoded.thresholds_hex(),
                })),
                Err(BatchError::Fields(errors)) => {
                    let lines: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
                    Err(lines.join("\n"))
                }
                Err(e) => Err(e.to_string()),
            }
        }

        Command::Describe {
            schema,
            ops,
            thresholds,
        } => {
            let thresholds = thresholds
                .iter()
                .map(|t| parse_hex_arg(t))
                .collect::<Result<Vec<_>, String>>()?;
            let summaries = describe_rules(&schema, &ops, &thresholds);
            serde_json::to_value(summaries).map_err(|e| e.to_string())
        }

        Command::Uid {
            schema,
            resolver,
            revocable,
        } => {
            let resolver = match resolver {
                Some(resolver) => resolver,
                None => load_config(cli.config.as_ref())?
                    .resolver_address
                    .ok_or("RESOLVER_ADDRESS is not set")?,
            };
            let resolver = parse_address(resolver.trim())
                .ok_or_else(|| format!("invalid resolver address: {}", resolver))?;
            let uid = SchemaUid::compute(&schema, &resolver, revocable);
            Ok(serde_json::json!({ "uid": uid.to_hex(), "schema": schema }))
        }
    }
}

fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    tracing::debug!("Running {:?}", cli.command);

    match run(cli) {
        Ok(output) => match serde_json::to_string_pretty(&output) {
            Ok(text) => {
                println!("{}", text);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("error: {}", e);
                ExitCode::FAILURE
            }
        },
        Err(message) => {
            eprintln!("error: {}", message);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rule_arg() {
        let (name, input) = parse_rule_arg("score=GE:100").unwrap();
        assert_eq!(name, "score");
        assert_eq!(input, FieldInput::new("GE", "100"));

        let (_, input) = parse_rule_arg("note=NONE").unwrap();
        assert_eq!(input, FieldInput::new("NONE", ""));

        let (_, input) = parse_rule_arg("label=EQ:a:b").unwrap();
        assert_eq!(input.value, "a:b");

        assert!(parse_rule_arg("score").is_err());
    }

    #[test]
    fn test_encode_command() {
        let cli = Cli::parse_from([
            "zuni-rules",
            "encode",
            "address wallet,uint256 score",
            "--rule",
            "wallet=EQ:0x1111111111111111111111111111111111111111",
            "--rule",
            "score=GE:100",
        ]);
        let output = run(cli).unwrap();
        assert_eq!(output["operators"], serde_json::json!([0, 3]));
        assert_eq!(
            output["thresholds"][1],
            format!("0x{}64", "0".repeat(62))
        );
    }

    #[test]
    fn test_encode_command_reports_errors() {
        let cli = Cli::parse_from(["zuni-rules", "encode", "uint8 level", "--rule", "level=GT:999"]);
        let err = run(cli).unwrap_err();
        assert!(err.contains("Must be a number between 0 and 255"));
    }

    #[test]
    fn test_describe_command() {
        let cli = Cli::parse_from([
            "zuni-rules",
            "describe",
            "uint8 level,foo bar",
            "--ops",
            "2,6",
            "--thresholds",
            &format!("0x{}07,0x", "0".repeat(62)),
        ]);
        let output = run(cli).unwrap();
        assert_eq!(output[0]["threshold"], "7");
        assert_eq!(output[1]["operator_label"], "Unsupported");
    }

    #[test]
    fn test_uid_command() {
        let cli = Cli::parse_from([
            "zuni-rules",
            "uid",
            "bool active",
            "--resolver",
            "0x2222222222222222222222222222222222222222",
        ]);
        let output = run(cli).unwrap();
        let expected = SchemaUid::compute("bool active", &[0x22; 20], true);
        assert_eq!(output["uid"], expected.to_hex());
    }
}
