use ac_domain::{Config, config::ConfigSeverity};

/// Run all diagnostic checks and print a summary.
///
/// Returns `Ok(true)` when every check passes, `Ok(false)` when at least
/// one check failed.
pub fn run(config: &Config, config_path: &str) -> bool {
    println!("autonomy-core doctor");
    println!("=====================\n");

    let mut all_passed = true;

    check_config_file(config_path, &mut all_passed);
    check_config_validation(config, &mut all_passed);
    check_state_dir_writable(config, &mut all_passed);
    check_llm_providers(config, &mut all_passed);
    check_tool_servers(config, &mut all_passed);
    check_seed_path(config, &mut all_passed);

    println!();
    if all_passed {
        println!("All checks passed.");
    } else {
        println!("Some checks failed. Review the output above.");
    }

    all_passed
}

fn check_config_file(config_path: &str, all_passed: &mut bool) {
    let exists = std::path::Path::new(config_path).exists();
    print_check(
        "Config file exists",
        exists,
        if exists {
            config_path.to_owned()
        } else {
            format!("{config_path} not found (using defaults)")
        },
    );
    if !exists {
        *all_passed = false;
    }
}

fn check_config_validation(config: &Config, all_passed: &mut bool) {
    let issues = config.validate();
    let error_count = issues
        .iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .count();

    if issues.is_empty() {
        print_check("Config validation", true, "no issues".into());
    } else {
        print_check(
            "Config validation",
            error_count == 0,
            format!("{} issue(s) ({} error(s))", issues.len(), error_count),
        );
        for issue in &issues {
            println!("      {issue}");
        }
        if error_count > 0 {
            *all_passed = false;
        }
    }
}

fn check_state_dir_writable(config: &Config, all_passed: &mut bool) {
    let path = &config.persistence.state_path;
    if let Err(e) = std::fs::create_dir_all(path) {
        print_check("Persistence state dir writable", false, format!("{}: {e}", path.display()));
        *all_passed = false;
        return;
    }
    let probe = path.join(".autonomy_core_doctor_probe");
    let writable = std::fs::write(&probe, b"probe").is_ok();
    let _ = std::fs::remove_file(&probe);
    print_check(
        "Persistence state dir writable",
        writable,
        if writable {
            format!("{} (writable)", path.display())
        } else {
            format!("{} (not writable)", path.display())
        },
    );
    if !writable {
        *all_passed = false;
    }
}

fn check_llm_providers(config: &Config, all_passed: &mut bool) {
    let count = config.llm.providers.len();
    let ok = count > 0 || config.llm.startup_policy == ac_domain::config::LlmStartupPolicy::AllowNone;
    print_check(
        "LLM providers configured",
        ok,
        if count > 0 {
            format!("{count} provider(s)")
        } else {
            "none configured (startup_policy = allow_none)".into()
        },
    );
    if !ok {
        *all_passed = false;
    }
}

fn check_tool_servers(config: &Config, all_passed: &mut bool) {
    let count = config.supervisor.servers.len();
    print_check(
        "Tool servers configured",
        true,
        if count > 0 {
            format!("{count} server(s)")
        } else {
            "none configured".into()
        },
    );
    let _ = all_passed;
}

fn check_seed_path(config: &Config, all_passed: &mut bool) {
    match &config.scheduler.seed_path {
        None => print_check("Scheduler seed_path", true, "not configured".into()),
        Some(path) => {
            let exists = path.exists();
            print_check(
                "Scheduler seed_path",
                exists,
                if exists {
                    path.display().to_string()
                } else {
                    format!("{} not found", path.display())
                },
            );
            if !exists {
                *all_passed = false;
            }
        }
    }
}

fn print_check(name: &str, passed: bool, detail: String) {
    let status = if passed { "PASS" } else { "FAIL" };
    println!("  [{status}] {name}: {detail}");
}
