use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser};
use dnssec_check::{CheckOptions, DigestPolicy, parse_resolver};

#[derive(Parser)]
#[command(name = "dnssec-check", version, about)]
pub struct Cli {
    /// domaine à vérifier (IDN accepté, réduit au domaine enregistrable)
    #[arg(long)]
    pub domain: String,

    /// résolveur de départ: ip ou ip:port
    #[arg(long, default_value = "8.8.8.8")]
    pub nameserver: String,

    /// format: json|text
    #[arg(long, default_value = "json")]
    pub output: String,

    /// timeout par requête (ms)
    #[arg(long = "timeout", default_value_t = dnssec_check::chain::DEFAULT_TIMEOUT_MS)]
    pub timeout_ms: u64,

    /// budget global de la vérification (ms)
    #[arg(long = "deadline")]
    pub deadline_ms: Option<u64>,

    /// digest pour le recalcul des DS: first|all
    #[arg(long = "digest-policy", default_value = "first")]
    pub digest_policy: String,

    /// récupère DS puis DNSKEY l'un après l'autre
    #[arg(long)]
    pub sequential: bool,

    /// n'accepte que la section answer (ignore les referrals)
    #[arg(long = "answers-only")]
    pub answers_only: bool,

    /// verbosité des logs sur stderr (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn check_options(&self) -> Result<CheckOptions> {
        let resolver = parse_resolver(&self.nameserver)
            .with_context(|| format!("invalid --nameserver '{}'", self.nameserver))?;
        Ok(CheckOptions::default()
            .with_resolver(resolver)
            .with_timeout_ms(self.timeout_ms)
            .with_deadline_ms(self.deadline_ms)
            .with_digest_policy(digest_policy_from_str(&self.digest_policy)?)
            .parallel_fetch(!self.sequential)
            .follow_referrals(!self.answers_only))
    }

    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

pub fn digest_policy_from_str(s: &str) -> Result<DigestPolicy> {
    match s {
        "first" => Ok(DigestPolicy::FirstPublished),
        "all" => Ok(DigestPolicy::AllPublished),
        other => bail!("unknown --digest-policy '{other}', use: first|all"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["dnssec-check"];
        argv.extend_from_slice(args);
        <Cli as Parser>::try_parse_from(argv).expect("valid flags")
    }

    #[test]
    fn defaults_map_to_default_options() {
        let options = cli(&["--domain", "example.com"]).check_options().expect("options");
        assert_eq!(options, CheckOptions::default());
    }

    #[test]
    fn flags_map_to_options() {
        let options = cli(&[
            "--domain",
            "example.com",
            "--nameserver",
            "9.9.9.9:5353",
            "--timeout",
            "1500",
            "--deadline",
            "10000",
            "--digest-policy",
            "all",
            "--sequential",
            "--answers-only",
        ])
        .check_options()
        .expect("options");

        assert_eq!(options.resolver.to_string(), "9.9.9.9:5353");
        assert_eq!(options.timeout_ms, 1500);
        assert_eq!(options.deadline_ms, Some(10_000));
        assert_eq!(options.digest_policy, DigestPolicy::AllPublished);
        assert!(!options.parallel_fetch);
        assert!(!options.follow_referrals);
    }

    #[test]
    fn bad_nameserver_is_fatal() {
        let err = cli(&["--domain", "example.com", "--nameserver", "dns.google"])
            .check_options()
            .expect_err("not an ip");
        assert!(err.to_string().contains("--nameserver"));
    }

    #[test]
    fn verbosity_raises_level() {
        assert_eq!(cli(&["--domain", "a.fr"]).log_level(), "warn");
        assert_eq!(cli(&["--domain", "a.fr", "-vv"]).log_level(), "debug");
    }
}
