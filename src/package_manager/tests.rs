use super::command::MockPrivilegePolicy;
use super::runner::MockCommandRunner;
use super::*;
use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex};

type Calls = Arc<Mutex<Vec<Invocation>>>;

fn builder(default_source: Option<&str>, elevated: bool) -> CommandBuilder {
    CommandBuilder::new(
        "choco",
        "sudo",
        default_source.map(str::to_string),
        Box::new(FixedPrivilege { elevated }),
    )
}

fn output(exit_code: i32, stdout: &str) -> Result<CommandResult> {
    Ok(CommandResult {
        exit_code,
        stdout: stdout.to_string(),
        stderr: String::new(),
    })
}

/// 按顺序返回给定输出，并记录每次调用
fn scripted(outputs: &[&'static str]) -> (MockCommandRunner, Calls) {
    let calls: Calls = Arc::default();
    let recorded = Arc::clone(&calls);
    let outputs: Vec<&'static str> = outputs.to_vec();
    let mut runner = MockCommandRunner::new();
    runner
        .expect_run()
        .times(outputs.len())
        .returning(move |inv| {
            let mut calls = recorded.lock().unwrap();
            let stdout = outputs[calls.len()];
            calls.push(inv.clone());
            output(0, stdout)
        });
    (runner, calls)
}

fn choco_with(runner: MockCommandRunner, default_source: Option<&str>) -> Chocolatey {
    Chocolatey::with_parts(builder(default_source, true), Box::new(runner))
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn args_of(calls: &Calls, index: usize) -> Vec<String> {
    calls.lock().unwrap()[index].args.clone()
}

#[test]
fn installed_groups_records_preserving_case() {
    let (runner, calls) = scripted(&["foo|1.0\nBar|2.0\n"]);
    let choco = choco_with(runner, Some("internal"));

    let packages = choco
        .installed(&[], &Options::new().set("all_versions", true))
        .unwrap();
    assert_eq!(packages.keys().collect::<Vec<_>>(), vec!["Bar", "foo"]);
    assert_eq!(
        packages.get("foo"),
        Some(&Package {
            id: "foo".to_string(),
            version: "1.0".to_string()
        })
    );
    assert_eq!(packages.get("BAR").map(|p| p.version.as_str()), Some("2.0"));

    // 本地查询不带 --source，调用方的 all_versions 被丢弃
    assert_eq!(
        args_of(&calls, 0),
        strings(&[
            "list",
            "--limit-output",
            "--local-only",
            "--accept-license",
            "--no-progress",
        ])
    );
    assert!(calls.lock().unwrap()[0].exec.capture_output);
}

#[test]
fn outdated_drops_entries_already_at_available_version() {
    let (runner, calls) = scripted(&["x|1.0|1.0|false\ngit|2.42.0|2.43.0|true\n"]);
    let choco = choco_with(runner, Some("internal"));

    let packages = choco.outdated(&OutdatedOptions::default()).unwrap();
    assert_eq!(packages.keys().collect::<Vec<_>>(), vec!["git"]);
    assert!(packages.get("git").unwrap().pinned);
    assert_eq!(
        args_of(&calls, 0),
        strings(&[
            "outdated",
            "--source=\"internal\"",
            "--limit-output",
            "--ignore-pinned",
            "--ignore-unfound",
            "--accept-license",
            "--no-progress",
        ])
    );
}

#[test]
fn malformed_record_is_a_value_error() {
    let (runner, _) = scripted(&["git|2.42.0|2.43.0|maybe\n"]);
    let err = choco_with(runner, None)
        .outdated(&OutdatedOptions::default())
        .unwrap_err();
    assert!(err.is_invalid_value());
    match err {
        Error::InvalidValue(e) => assert_eq!(e, crate::error::ValueError::new("pinned", "maybe")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn search_pages_until_empty_output() {
    let (runner, calls) = scripted(&["git|2.43.0\n", "jq|1.7.1\n", "  \n"]);
    let choco = choco_with(runner, None);

    let opts = SearchOptions {
        options: Options::new().set("page", 7u32).set("pre", true),
        ..SearchOptions::default()
    };
    let packages = choco.search(Some("git"), &opts).unwrap();
    assert_eq!(packages.keys().collect::<Vec<_>>(), vec!["git", "jq"]);

    for page in 0..3 {
        let args = args_of(&calls, page);
        assert_eq!(args[..2].to_vec(), strings(&["search", "git"]));
        assert!(args.contains(&format!("--page={page}")));
        assert!(args.contains(&"--pre".to_string()));
    }
}

#[test]
fn exact_search_reads_a_single_page() {
    let (runner, calls) = scripted(&["git|2.43.0\n"]);
    let opts = SearchOptions {
        exact: true,
        ..SearchOptions::default()
    };
    let packages = choco_with(runner, None).search(Some("git"), &opts).unwrap();
    assert_eq!(packages.len(), 1);
    assert!(args_of(&calls, 0).contains(&"--exact".to_string()));
}

#[test]
fn search_all_versions_accumulates_records() {
    let (runner, calls) = scripted(&["git|2.43.0\ngit|2.42.0\n", ""]);
    let opts = SearchOptions {
        all_versions: true,
        ..SearchOptions::default()
    };
    let packages = choco_with(runner, None).search(None, &opts).unwrap();
    let versions: Vec<&str> = packages
        .get_all("git")
        .unwrap()
        .iter()
        .map(|p| p.version.as_str())
        .collect();
    assert_eq!(versions, vec!["2.42.0", "2.43.0"]);
    assert!(args_of(&calls, 0).contains(&"--all-versions".to_string()));
}

const GIT_INFO: &str = "Chocolatey v2.2.2\n\
git 2.43.0 [Approved]\n \
Title: Git | Published: 11/21/2023\n \
Description: Git for Windows focuses on offering a lightweight, native set of tools\n  \
that bring the full feature set of the Git SCM to Windows.\n\
\n\
1 packages found.\n";

#[test]
fn info_merges_flat_and_detailed_passes() {
    let (runner, calls) = scripted(&["git|2.43.0\n", GIT_INFO]);
    let choco = choco_with(runner, None);

    let info = choco.info("git", &InfoOptions::default()).unwrap().unwrap();
    assert_eq!(info.id, "git");
    assert_eq!(info.version, "2.43.0");
    assert_eq!(info.title, "Git");
    assert_eq!(info.published, "11/21/2023");
    assert_eq!(
        info.description,
        "Git for Windows focuses on offering a lightweight, native set of tools\n that bring the full feature set of the Git SCM to Windows."
    );
    // 缺少 Summary 行时为空串
    assert_eq!(info.summary, "");

    assert!(args_of(&calls, 0).contains(&"--limit-output".to_string()));
    assert!(!args_of(&calls, 1).contains(&"--limit-output".to_string()));
}

#[test]
fn info_for_unknown_package_is_none() {
    let (runner, _) = scripted(&["\n"]);
    let info = choco_with(runner, None)
        .info("nope", &InfoOptions::default())
        .unwrap();
    assert_eq!(info, None);
}

#[test]
fn info_keeps_flat_record_when_detail_is_empty() {
    let (runner, _) = scripted(&["git|2.43.0\n", ""]);
    let info = choco_with(runner, None)
        .info("git", &InfoOptions::default())
        .unwrap()
        .unwrap();
    assert_eq!(info.version, "2.43.0");
    assert_eq!(info.title, "");
}

#[test]
fn install_without_ids_spawns_nothing() {
    let mut runner = MockCommandRunner::new();
    runner.expect_run().never();
    let choco = choco_with(runner, None);

    let err = choco.install(&[], &InstallOptions::default()).unwrap_err();
    assert!(err.is_invalid_argument());
    assert!(choco.upgrade(&[], &UpgradeOptions::default()).is_err());
    assert!(choco.uninstall(&[], &UninstallOptions::default()).is_err());
}

#[test]
fn install_elevates_and_streams_output() {
    let (runner, calls) = scripted(&[""]);
    let choco = Chocolatey::with_parts(builder(None, false), Box::new(runner));

    choco
        .install(&["git", "7zip"], &InstallOptions::default())
        .unwrap();
    let call = calls.lock().unwrap()[0].clone();
    assert_eq!(call.program, std::path::PathBuf::from("sudo"));
    assert_eq!(
        call.args,
        strings(&[
            "choco",
            "install",
            "git",
            "7zip",
            "--yes",
            "--accept-license",
            "--no-progress",
        ])
    );
    assert!(!call.exec.capture_output);
}

#[test]
fn non_zero_exit_is_process_failed() {
    let mut runner = MockCommandRunner::new();
    runner.expect_run().times(1).returning(|_| {
        Ok(CommandResult {
            exit_code: 1,
            stdout: "Chocolatey installed 0/1 packages.".to_string(),
            stderr: "git not installed.".to_string(),
        })
    });
    let err = choco_with(runner, None)
        .upgrade(&["git"], &UpgradeOptions::default())
        .unwrap_err();
    match &err {
        Error::ProcessFailed {
            exit_code, command, ..
        } => {
            assert_eq!(*exit_code, 1);
            assert!(command.starts_with("choco upgrade git"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(
        err.captured_output(),
        Some(("Chocolatey installed 0/1 packages.", "git not installed."))
    );
}

#[test]
fn unchecked_raw_call_returns_failing_result() {
    let mut runner = MockCommandRunner::new();
    runner
        .expect_run()
        .withf(|inv| inv.exec.capture_output && !inv.exec.check)
        .times(1)
        .returning(|_| output(2, "bad option"));
    let result = choco_with(runner, None)
        .choco(&["--bogus"], &Options::new().set("check", false))
        .unwrap();
    assert_eq!(result.exit_code, 2);
    assert_eq!(result.stdout, "bad option");
}

#[test]
fn default_timeout_applies_unless_overridden() {
    let (runner, calls) = scripted(&["", ""]);
    let choco = choco_with(runner, None).default_timeout(Some(Duration::from_secs(30)));

    choco.cache_list(&Options::new()).unwrap();
    choco
        .cache_remove(&Options::new().timeout(Duration::from_secs(5)))
        .unwrap();
    let calls = calls.lock().unwrap();
    assert_eq!(calls[0].exec.timeout, Some(Duration::from_secs(30)));
    assert_eq!(calls[1].exec.timeout, Some(Duration::from_secs(5)));
}

#[test]
fn version_skips_source_and_parses_parts() {
    let (runner, calls) = scripted(&["2.2.2\r\n"]);
    let choco = choco_with(runner, Some("internal"));
    assert_eq!(
        choco.version_info().unwrap(),
        VersionInfo {
            major: 2,
            minor: 2,
            micro: 2,
            serial: 0
        }
    );
    assert_eq!(
        args_of(&calls, 0),
        strings(&["--version", "--limit-output", "--accept-license", "--no-progress"])
    );
}

#[test]
fn help_for_subcommand() {
    let (runner, calls) = scripted(&["\n\nInstall Command\r\n"]);
    let text = choco_with(runner, None).help(Some("install")).unwrap();
    assert_eq!(text, "Install Command\n");
    assert_eq!(
        args_of(&calls, 0),
        strings(&[
            "install",
            "--help",
            "--limit-output",
            "--accept-license",
            "--no-progress",
        ])
    );
}

#[test]
fn config_get_coerces_value() {
    let (runner, _) = scripted(&["true\r\n", "C:\\cache\n", "\n"]);
    let choco = choco_with(runner, None);
    assert_eq!(
        choco.config_get("proxyBypassOnLocal", &Options::new()).unwrap(),
        ConfigValue::Bool(true)
    );
    assert_eq!(
        choco.config_get("cacheLocation", &Options::new()).unwrap(),
        ConfigValue::Text("C:\\cache".to_string())
    );
    assert_eq!(
        choco.config_get("proxy", &Options::new()).unwrap(),
        ConfigValue::Text(String::new())
    );
}

#[test]
fn config_set_empty_value_unsets() {
    let (runner, calls) = scripted(&["", "", ""]);
    let choco = choco_with(runner, None);

    choco.config_set("proxy", None, &Options::new()).unwrap();
    choco
        .config_set("proxy", Some(ConfigValue::from("")), &Options::new())
        .unwrap();
    choco
        .config_set("proxyBypassOnLocal", Some(false.into()), &Options::new())
        .unwrap();

    assert_eq!(args_of(&calls, 0)[..3].to_vec(), strings(&["config", "unset", "--name=proxy"]));
    assert_eq!(args_of(&calls, 1)[1], "unset");
    assert_eq!(
        args_of(&calls, 2)[..4].to_vec(),
        strings(&["config", "set", "--name=proxyBypassOnLocal", "--value=false"])
    );
}

#[test]
fn feature_get_is_strict() {
    let (runner, _) = scripted(&["Enabled\n", "Disabled\n", "sometimes\n"]);
    let choco = choco_with(runner, None);
    assert!(choco.feature_get("checksumFiles", &Options::new()).unwrap());
    assert!(!choco.feature_get("checksumFiles", &Options::new()).unwrap());
    assert!(choco
        .feature_get("checksumFiles", &Options::new())
        .unwrap_err()
        .is_invalid_value());
}

#[test]
fn sources_are_parsed_with_typed_fields() {
    let (runner, _) = scripted(&[
        "local|C:\\pkgs|True|||10|False|False|True\nchocolatey|https://community.chocolatey.org/api/v2/|False|||0|False|False|False\n",
    ]);
    let sources = choco_with(runner, None).sources(&Options::new()).unwrap();
    let local = sources.get("LOCAL").unwrap();
    assert!(local.disabled);
    assert_eq!(local.priority, 10);
    assert!(local.admin_only);
    assert_eq!(local.user, None);
}

#[test]
fn source_add_passes_url_as_plain_flag() {
    let (runner, calls) = scripted(&[""]);
    choco_with(runner, Some("internal"))
        .source_add("local", "C:\\pkgs", &Options::new().set("priority", 1u32))
        .unwrap();
    assert_eq!(
        args_of(&calls, 0),
        strings(&[
            "source",
            "add",
            "--name=local",
            "--source=C:\\pkgs",
            "--priority=1",
            "--accept-license",
            "--no-progress",
        ])
    );
}

#[test]
fn apikey_add_uses_explicit_source() {
    let (runner, calls) = scripted(&[""]);
    choco_with(runner, Some("internal"))
        .apikey_add("https://push.example.org/", "secret", &Options::new())
        .unwrap();
    assert_eq!(
        args_of(&calls, 0),
        strings(&[
            "apikey",
            "add",
            "--source=https://push.example.org/",
            "--api-key=secret",
            "--accept-license",
            "--no-progress",
        ])
    );
}

#[test]
fn pin_add_drops_reason() {
    let (runner, calls) = scripted(&[""]);
    choco_with(runner, None)
        .pin_add("git", &Options::new().set("reason", "broken").set("version", "2.42.0"))
        .unwrap();
    assert_eq!(
        args_of(&calls, 0),
        strings(&[
            "pin",
            "add",
            "--name=git",
            "--version=2.42.0",
            "--accept-license",
            "--no-progress",
        ])
    );
}

#[test]
fn new_package_quotes_properties() {
    let (runner, calls) = scripted(&[""]);
    choco_with(runner, None)
        .new_package(
            "mytool",
            &[("maintainername", "Me"), ("packageversion", "1.0.0")],
            &Options::new(),
        )
        .unwrap();
    assert_eq!(
        args_of(&calls, 0)[..4].to_vec(),
        strings(&[
            "new",
            "mytool",
            "\"maintainername=Me\"",
            "\"packageversion=1.0.0\"",
        ])
    );
}

#[test]
fn template_info_returns_first_record() {
    let (runner, calls) = scripted(&["zip|1.0.0\n", ""]);
    let choco = choco_with(runner, None);
    assert_eq!(
        choco.template_info("zip", &Options::new()).unwrap(),
        Some(Template {
            name: "zip".to_string(),
            version: "1.0.0".to_string()
        })
    );
    assert_eq!(choco.template_info("none", &Options::new()).unwrap(), None);
    assert!(args_of(&calls, 0).contains(&"--name=zip".to_string()));
}

#[test]
fn apikeys_are_listed_in_order() {
    let (runner, _) = scripted(&["https://b.example/|(Authenticated)\nhttps://a.example/|(Authenticated)\n"]);
    let keys = choco_with(runner, None).apikeys(&Options::new()).unwrap();
    let sources: Vec<&str> = keys.iter().map(|k| k.source.as_str()).collect();
    assert_eq!(sources, vec!["https://a.example/", "https://b.example/"]);
}

#[test]
fn privilege_is_checked_only_for_privileged_commands() {
    let mut policy = MockPrivilegePolicy::new();
    policy.expect_requires_relaunch().times(1).return_const(true);
    let (runner, calls) = scripted(&["git|2.43.0\n", ""]);
    let builder = CommandBuilder::new("choco", "gsudo", None, Box::new(policy));
    let choco = Chocolatey::with_parts(builder, Box::new(runner));

    choco.installed(&[], &Options::new()).unwrap();
    choco
        .uninstall(&["git"], &UninstallOptions::default())
        .unwrap();

    let calls = calls.lock().unwrap();
    assert_eq!(calls[0].program, std::path::PathBuf::from("choco"));
    assert_eq!(calls[1].program, std::path::PathBuf::from("gsudo"));
    assert_eq!(calls[1].args[..3].to_vec(), strings(&["choco", "uninstall", "git"]));
}
