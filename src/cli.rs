//! Command-line handling for the `issue_license` binary.
//!
//! # Usage
//!
//! ```text
//! issue_license [--plan home] [--email test@test.com] [--days 365] [--max-devices 1]
//!               [--config config] [--json]
//! ```
//!
//! With no arguments a `home` license for `test@test.com` is issued using the
//! plan table's limits.

use crate::config::DEFAULT_CONFIG_FILE;
use crate::errors::{LicenseError, LicenseResult};
use crate::license::{LicenseRecord, LicenseRequest};
use crate::plans::{PlanTable, DEFAULT_PLAN};

/// Customer email used when none is given.
pub const DEFAULT_CUSTOMER_EMAIL: &str = "test@test.com";

pub const USAGE: &str = "\
Usage: issue_license [OPTIONS]

Options:
  -p, --plan <PLAN>            Plan identifier (default: home)
  -e, --email <EMAIL>          Customer email (default: test@test.com)
  -d, --days <DAYS>            Validity in days (default: from plan)
  -m, --max-devices <COUNT>    Device limit (default: from plan)
  -c, --config <FILE>          Configuration file (default: config)
      --json                   Print the created record as JSON
  -h, --help                   Show this help

Environment:
  LICENSE_SECRET_KEY           Signing secret (required)
  ISSUER_DATABASE_URL          Database connection URL";

/// Arguments for one issuance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueArgs {
    pub plan: String,
    pub customer_email: String,
    pub validity_days: Option<u32>,
    pub max_devices: Option<u32>,
    pub config_file: String,
    pub json: bool,
}

impl Default for IssueArgs {
    fn default() -> Self {
        Self {
            plan: DEFAULT_PLAN.to_string(),
            customer_email: DEFAULT_CUSTOMER_EMAIL.to_string(),
            validity_days: None,
            max_devices: None,
            config_file: DEFAULT_CONFIG_FILE.to_string(),
            json: false,
        }
    }
}

impl IssueArgs {
    /// Resolve the plan's limits and apply any overrides.
    pub fn to_request(&self, plans: &PlanTable) -> LicenseResult<LicenseRequest> {
        let mut request = LicenseRequest::for_plan(plans, &self.plan, self.customer_email.clone())?;
        if let Some(days) = self.validity_days {
            request = request.with_validity_days(days);
        }
        if let Some(max) = self.max_devices {
            request = request.with_max_devices(max);
        }
        request.validate()?;
        Ok(request)
    }
}

/// Parsed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Issue(IssueArgs),
    Help,
}

fn flag_value<'a>(args: &'a [String], i: usize, flag: &str) -> LicenseResult<&'a str> {
    args.get(i + 1)
        .map(String::as_str)
        .ok_or_else(|| LicenseError::InvalidRequest(format!("{flag} requires a value")))
}

fn parse_count(value: &str, flag: &str) -> LicenseResult<u32> {
    value.parse::<u32>().map_err(|_| {
        LicenseError::InvalidRequest(format!("{flag} must be a positive integer, got '{value}'"))
    })
}

/// Parse process arguments (including the program name at index 0).
pub fn parse_command(args: &[String]) -> LicenseResult<Command> {
    let mut issue = IssueArgs::default();

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--help" | "-h" => return Ok(Command::Help),
            "--json" => {
                issue.json = true;
                i += 1;
            }
            "--plan" | "-p" => {
                issue.plan = flag_value(args, i, flag)?.to_string();
                i += 2;
            }
            "--email" | "-e" => {
                issue.customer_email = flag_value(args, i, flag)?.to_string();
                i += 2;
            }
            "--days" | "-d" => {
                issue.validity_days = Some(parse_count(flag_value(args, i, flag)?, flag)?);
                i += 2;
            }
            "--max-devices" | "-m" => {
                issue.max_devices = Some(parse_count(flag_value(args, i, flag)?, flag)?);
                i += 2;
            }
            "--config" | "-c" => {
                issue.config_file = flag_value(args, i, flag)?.to_string();
                i += 2;
            }
            other => {
                return Err(LicenseError::InvalidRequest(format!(
                    "unrecognized argument '{other}'"
                )));
            }
        }
    }

    Ok(Command::Issue(issue))
}

/// Human-readable report of a created license.
pub fn format_report(record: &LicenseRecord) -> String {
    format!(
        "License created in database!\n\
         Key: {}\n\
         Plan: {}\n\
         Max devices: {}\n\
         Expires: {}",
        record.license_key,
        record.plan,
        record.max_devices,
        record.expires_at.format("%Y-%m-%dT%H:%M:%S%.6f"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("issue_license")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn no_arguments_issue_default_home_license() {
        let cmd = parse_command(&args(&[])).unwrap();
        assert_eq!(cmd, Command::Issue(IssueArgs::default()));

        let Command::Issue(issue) = cmd else {
            unreachable!()
        };
        let request = issue.to_request(&PlanTable::default()).unwrap();
        assert_eq!(request.plan, "home");
        assert_eq!(request.customer_email, "test@test.com");
        assert_eq!(request.validity_days, 365);
        assert_eq!(request.max_devices, 1);
    }

    #[test]
    fn parses_all_flags() {
        let cmd = parse_command(&args(&[
            "--plan",
            "home",
            "-e",
            "ops@example.com",
            "--days",
            "30",
            "-m",
            "2",
            "--config",
            "issuer",
            "--json",
        ]))
        .unwrap();

        assert_eq!(
            cmd,
            Command::Issue(IssueArgs {
                plan: "home".to_string(),
                customer_email: "ops@example.com".to_string(),
                validity_days: Some(30),
                max_devices: Some(2),
                config_file: "issuer".to_string(),
                json: true,
            })
        );
    }

    #[test]
    fn help_flag_wins() {
        assert_eq!(parse_command(&args(&["--plan", "home", "-h"])).unwrap(), Command::Help);
    }

    #[test]
    fn missing_value_is_an_error() {
        let err = parse_command(&args(&["--plan"])).unwrap_err();
        assert!(matches!(err, LicenseError::InvalidRequest(msg) if msg.contains("--plan")));
    }

    #[test]
    fn non_numeric_days_is_an_error() {
        assert!(parse_command(&args(&["--days", "a-year"])).is_err());
        assert!(parse_command(&args(&["--max-devices", "-1"])).is_err());
    }

    #[test]
    fn unknown_argument_is_an_error() {
        assert!(parse_command(&args(&["--frobnicate"])).is_err());
    }

    #[test]
    fn zero_overrides_fail_request_validation() {
        let issue = IssueArgs {
            validity_days: Some(0),
            ..IssueArgs::default()
        };
        assert!(matches!(
            issue.to_request(&PlanTable::default()),
            Err(LicenseError::InvalidRequest(_))
        ));
    }

    #[test]
    fn huge_day_count_is_an_invalid_request() {
        let cmd = parse_command(&args(&["--days", "4000000000"])).unwrap();
        let Command::Issue(issue) = cmd else {
            unreachable!()
        };
        assert_eq!(issue.validity_days, Some(4_000_000_000));

        let err = issue.to_request(&PlanTable::default()).unwrap_err();
        assert!(matches!(err, LicenseError::InvalidRequest(ref msg) if msg.contains("at most")));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn unknown_plan_fails_request() {
        let issue = IssueArgs {
            plan: "gold".to_string(),
            ..IssueArgs::default()
        };
        assert!(matches!(
            issue.to_request(&PlanTable::default()),
            Err(LicenseError::UnknownPlan(_))
        ));
    }

    #[test]
    fn report_lists_key_plan_devices_and_expiry() {
        let created = NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let request = LicenseRequest::new("home", "test@test.com", 365, 1);
        let record = LicenseRecord::issue("LIC-HOME-TEST".to_string(), &request, created).unwrap();

        let report = format_report(&record);
        assert!(report.contains("Key: LIC-HOME-TEST"));
        assert!(report.contains("Plan: home"));
        assert!(report.contains("Max devices: 1"));
        assert!(report.contains("Expires: 2026-01-01T12:00:00.000000"));
    }
}
