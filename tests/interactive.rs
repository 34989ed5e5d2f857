use std::collections::HashMap;
use std::error::Error;
use std::io::{self, Write};
use std::time::Duration;

use linkrank_rs::{
    AuthorityChecker,
    Engine,
    FingerprintRandomizer,
    ProxyPool,
    ProxyPoolConfig,
    RateLimiter,
    ResultValidator,
    AuthorityScorer,
    VERSION,
};
use tokio::runtime::Runtime;

fn prompt(label: &str) -> io::Result<String> {
    print!("{} ", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn parse_bool(input: &str, default: bool) -> bool {
    match input.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" | "true" => true,
        "n" | "no" | "false" => false,
        _ => default,
    }
}

#[test]
#[ignore = "Requires network access and manual input"]
fn interactive_full_stack() -> Result<(), Box<dyn Error>> {
    println!("linkrank-rs {} interactive smoke test", VERSION);
    println!("Provide inputs when prompted. Press Enter to accept defaults.\n");

    let domain_input = prompt("Domain to check [example.com]:")?;
    let domain = if domain_input.is_empty() {
        "example.com".to_string()
    } else {
        domain_input
    };

    let browser_answer = prompt("Use browser-automation probes? (y/N):")?;
    let proxies_answer = prompt("Proxy list (comma separated, blank for none):")?;

    let proxy_endpoints: Vec<String> = proxies_answer
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect();

    let mut builder = AuthorityChecker::builder();
    if !proxy_endpoints.is_empty() {
        builder = builder.with_proxies(proxy_endpoints.iter().cloned());
    }
    if !parse_bool(&browser_answer, false) {
        builder = builder.disable_browser_probes();
    }

    let checker = builder.build();
    let runtime = Runtime::new()?;

    println!("\nChecking authority of {}...", domain);
    let score = runtime.block_on(checker.check_authority(&domain))?;
    println!("Score breakdown:\n{}\n", serde_json::to_string_pretty(&score)?);

    println!("Performance summary:");
    for (engine, summary) in checker.performance_summary() {
        println!(
            "  {} -> success_rate: {:.2}, avg_response: {:.2}s, requests: {}",
            engine, summary.success_rate, summary.average_response_time, summary.total_requests
        );
    }

    if !proxy_endpoints.is_empty() {
        println!("Proxy report:");
        for (endpoint, summary) in checker.proxy_report() {
            println!(
                "  {} -> active: {}, success_rate: {:.2}, requests: {}",
                endpoint, summary.is_active, summary.success_rate, summary.total_requests
            );
        }
    }

    exercise_supporting_modules(&domain, &runtime)?;

    println!("Interactive test complete. Re-run with different inputs as needed.");
    Ok(())
}

fn exercise_supporting_modules(domain: &str, runtime: &Runtime) -> Result<(), Box<dyn Error>> {
    println!("\n--- Exercising supporting modules ---");

    let pool = ProxyPool::with_proxies(
        ProxyPoolConfig {
            max_consecutive_failures: 1,
            ..Default::default()
        },
        ["http://127.0.0.1:8080", "http://127.0.0.1:9090"],
    );
    if let Some(proxy) = pool.rotate_and_current() {
        pool.record_outcome_for(&proxy, false, Duration::from_millis(300));
    }
    let report = pool.report();
    let active = report.values().filter(|s| s.is_active).count();
    println!("Proxy pool -> total: {}, active: {}", report.len(), active);

    let validator = ResultValidator::default();
    validator.validate_and_record(domain, Engine::Bing, 12_000);
    validator.validate_and_record(domain, Engine::DuckDuckGo, 11_500);
    let accepted = validator.validate(domain, Engine::Google, 1_000_000);
    println!(
        "Validator -> history: {:?}, outlier accepted: {}",
        validator.history_for(domain),
        accepted
    );

    let scorer = AuthorityScorer::new();
    let counts = HashMap::from([
        (Engine::Bing, 12_000u64),
        (Engine::DuckDuckGo, 11_500u64),
    ]);
    let score = scorer.score(domain, &counts);
    println!(
        "Scorer -> weighted: {:.0}, log: {}, bonus: {}, final: {}",
        score.weighted_total, score.log_score, score.diversity_bonus, score.final_score
    );

    let fingerprints = FingerprintRandomizer::new();
    let fingerprint = fingerprints.generate();
    println!(
        "Fingerprint -> {} {} on {} ({}x{})",
        fingerprint.browser,
        fingerprint.browser_version,
        fingerprint.os,
        fingerprint.screen_resolution.0,
        fingerprint.screen_resolution.1
    );

    let limiter = RateLimiter::default();
    let backoff = runtime.block_on(async {
        limiter.wait("demo").await;
        limiter.backoff_time("demo").await
    });
    println!("Rate limiter -> first backoff: {:?}", backoff);

    println!("--- Module exercise complete ---\n");
    Ok(())
}
