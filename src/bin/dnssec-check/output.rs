use anyhow::{Result, bail};
use dnssec_check::{DsRecord, Report};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Text,
}

impl Format {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "json" if cfg!(feature = "with-serde") => Ok(Self::Json),
            "json" => bail!("format=json nécessite la feature 'with-serde'"),
            "text" => Ok(Self::Text),
            other => bail!("unknown --output '{other}', use: json|text"),
        }
    }
}

pub fn render(report: &Report, format: Format) -> Result<String> {
    match format {
        Format::Json => render_json(report),
        Format::Text => Ok(render_text(report)),
    }
}

#[cfg(feature = "with-serde")]
fn render_json(report: &Report) -> Result<String> {
    use anyhow::Context;
    serde_json::to_string_pretty(report).context("serialize report")
}

#[cfg(not(feature = "with-serde"))]
fn render_json(_report: &Report) -> Result<String> {
    bail!("format=json nécessite la feature 'with-serde'")
}

pub fn render_text(report: &Report) -> String {
    let question = &report.question;
    let answer = &report.answer;
    let mut lines = vec![
        format!("Domain....: {}", question.domain),
        format!("Time......: {}", question.time.format("%Y-%m-%d %H:%M:%S UTC")),
        format!("Status....: {}", question.status),
        format!("Message...: {}", question.message),
    ];
    if let Some(status) = report.zone_status {
        lines.push(format!("Zone......: {status}"));
    }
    for warning in &report.warnings {
        lines.push(format!("Warning...: {:?}: {}", warning.stage, warning.message));
    }
    if !report.is_ok() {
        return lines.join("\n");
    }

    lines.push(String::new());
    let section = if answer.registry.icann { "ICANN" } else { "private" };
    lines.push(format!("TLD.......: {} ({section})", answer.registry.tld));
    lines.push(format!("Root NS...: {}", host_list(&answer.nameservers.root)));
    lines.push(format!("TLD NS....: {}", host_list(&answer.nameservers.registry)));
    lines.push(format!("Domain NS.: {}", host_list(&answer.nameservers.domain)));

    lines.push(format!("DS........: {}", answer.ds_record_count));
    lines.extend(answer.ds_records.iter().map(ds_line));
    lines.push(format!("DNSKEY....: {}", answer.dnskey_record_count));
    lines.extend(answer.dnskey_records.iter().map(|key| {
        format!(
            "  {} {} {} (key tag {})",
            key.flags, key.protocol, key.algorithm, key.key_tag
        )
    }));
    lines.push(format!("Calc. DS..: {}", answer.calculated_ds.len()));
    lines.extend(answer.calculated_ds.iter().map(ds_line));
    lines.push(format!("Matches...: {}", answer.matching.len()));
    lines.extend(
        answer
            .matching
            .pairs()
            .map(|(ds, key)| format!("{} <- DNSKEY {}", ds_line(ds), key.key_tag)),
    );
    lines.push(format!("Chain.....: {}", report.chain_state()));
    lines.join("\n")
}

fn ds_line(ds: &DsRecord) -> String {
    format!("  {ds}")
}

fn host_list(hosts: &[String]) -> String {
    if hosts.is_empty() {
        "-".to_string()
    } else {
        hosts.join(", ")
    }
}
