//! Export a [`JobSpec`] as the scheduler's native HCL job file.

use super::JobSpec;
use std::fmt::Write;
use std::time::Duration;

const INDENT: &str = "  ";

/// One HCL block: attributes first (with aligned `=`), then nested blocks.
struct Block {
    header: String,
    attrs: Vec<(String, String)>,
    blocks: Vec<Block>,
}

impl Block {
    fn new(kind: &str) -> Self {
        Self {
            header: kind.to_string(),
            attrs: Vec::new(),
            blocks: Vec::new(),
        }
    }

    fn labeled(kind: &str, label: &str) -> Self {
        Self::new(&format!("{kind} {}", quote(label)))
    }

    fn attr(mut self, key: &str, value: String) -> Self {
        self.attrs.push((key.to_string(), value));
        self
    }

    fn str(self, key: &str, value: &str) -> Self {
        self.attr(key, quote(value))
    }

    fn duration(self, key: &str, value: Duration) -> Self {
        self.str(key, &humantime::format_duration(value).to_string())
    }

    fn list(self, key: &str, items: &[String]) -> Self {
        let body: Vec<String> = items.iter().map(|i| quote(i)).collect();
        self.attr(key, format!("[{}]", body.join(", ")))
    }

    fn block(mut self, block: Block) -> Self {
        self.blocks.push(block);
        self
    }

    fn render(&self, depth: usize, out: &mut String) {
        let pad = INDENT.repeat(depth);
        let _ = writeln!(out, "{pad}{} {{", self.header);
        let width = self.attrs.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
        for (key, value) in &self.attrs {
            let _ = writeln!(out, "{pad}{INDENT}{key:<width$} = {value}");
        }
        for (i, block) in self.blocks.iter().enumerate() {
            if i > 0 || !self.attrs.is_empty() {
                out.push('\n');
            }
            block.render(depth + 1, out);
        }
        let _ = writeln!(out, "{pad}}}");
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('"');
    escape_interpolation(&out)
}

/// `${` and `%{` start HCL interpolation; double the sigil to keep them literal.
fn escape_interpolation(s: &str) -> String {
    s.replace("${", "$${").replace("%{", "%%{")
}

fn heredoc(body: &str) -> String {
    let mut body = escape_interpolation(body);
    if !body.ends_with('\n') {
        body.push('\n');
    }
    format!("<<EOH\n{body}EOH")
}

impl JobSpec {
    pub fn to_hcl(&self) -> String {
        let group = &self.group;
        let task = &group.task;

        let mut job = Block::labeled("job", &self.job)
            .list("datacenters", &self.datacenters)
            .str("type", &self.job_type);
        if !self.meta.is_empty() {
            let meta = self
                .meta
                .iter()
                .fold(Block::new("meta"), |b, (k, v)| b.str(k, v));
            job = job.block(meta);
        }

        let mut g = Block::labeled("group", &group.name).attr("count", group.count.to_string());

        let network = group.network.port.iter().fold(Block::new("network"), |n, (name, port)| {
            let mut p = Block::labeled("port", name);
            if let Some(to) = port.to {
                p = p.attr("to", to.to_string());
            }
            if let Some(fixed) = port.static_port {
                p = p.attr("static", fixed.to_string());
            }
            n.block(p)
        });
        g = g.block(network);

        for service in &group.service {
            let mut s = Block::new("service")
                .str("name", &service.name)
                .str("port", &service.port);
            if !service.tags.is_empty() {
                s = s.list("tags", &service.tags);
            }
            for check in &service.check {
                let mut c = Block::new("check");
                if let Some(name) = &check.name {
                    c = c.str("name", name);
                }
                c = c
                    .str("type", &check.check_type)
                    .str("path", &check.path)
                    .duration("interval", check.interval)
                    .duration("timeout", check.timeout);
                s = s.block(c);
            }
            g = g.block(s);
        }

        let restart = &group.restart;
        g = g.block(
            Block::new("restart")
                .attr("attempts", restart.attempts.to_string())
                .duration("interval", restart.interval)
                .duration("delay", restart.delay)
                .str("mode", &restart.mode.to_string()),
        );

        for (name, volume) in &group.volume {
            g = g.block(
                Block::labeled("volume", name)
                    .str("type", &volume.volume_type)
                    .str("source", &volume.source)
                    .attr("read_only", volume.read_only.to_string()),
            );
        }

        let mut config = Block::new("config").str("image", &task.config.image);
        if !task.config.ports.is_empty() {
            config = config.list("ports", &task.config.ports);
        }
        if !task.config.volumes.is_empty() {
            config = config.list("volumes", &task.config.volumes);
        }

        let mut t = Block::labeled("task", &task.name)
            .str("driver", &task.driver)
            .block(config);
        if !task.env.is_empty() {
            t = t.block(task.env.iter().fold(Block::new("env"), |b, (k, v)| b.str(k, v)));
        }
        if let Some(tpl) = &task.template {
            t = t.block(
                Block::new("template")
                    .str("destination", &tpl.destination)
                    .attr("env", tpl.env.to_string())
                    .attr("data", heredoc(&tpl.data)),
            );
        }
        t = t.block(
            Block::new("resources")
                .attr("cpu", task.resources.cpu.to_string())
                .attr("memory", task.resources.memory.to_string()),
        );
        if let Some(mount) = &task.volume_mount {
            t = t.block(
                Block::new("volume_mount")
                    .str("volume", &mount.volume)
                    .str("destination", &mount.destination)
                    .attr("read_only", mount.read_only.to_string()),
            );
        }
        t = t.block(
            Block::new("logs")
                .attr("max_files", task.logs.max_files.to_string())
                .attr("max_file_size", task.logs.max_file_size.to_string()),
        );

        job = job.block(g.block(t));

        let mut out = String::new();
        job.render(0, &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deploy::tests::DESCRIPTOR;

    #[test]
    fn exports_job_blocks() {
        let hcl = JobSpec::from_yaml(DESCRIPTOR).unwrap().to_hcl();
        assert!(hcl.starts_with("job \"mattermost-mcp\" {\n"));
        assert!(hcl.contains("  datacenters = [\"dc1\"]\n"));
        assert!(hcl.contains("      port \"http\" {\n        to = 8000\n"));
        assert!(hcl.contains("        interval = \"30s\"\n"));
        assert!(hcl.contains("        timeout  = \"5s\"\n"));
        assert!(hcl.contains("      interval = \"5m\"\n"));
        assert!(hcl.contains("      mode     = \"fail\"\n"));
        assert!(hcl.contains("volume \"mattermost-mcp-data\""));
        assert!(hcl.contains("max_file_size = 10"));
        assert!(hcl.ends_with("}\n"));
    }

    #[test]
    fn template_data_is_a_heredoc() {
        let hcl = JobSpec::from_yaml(DESCRIPTOR).unwrap().to_hcl();
        assert!(hcl.contains("data        = <<EOH\n{{ with secret \"secret/data/mattermost-mcp\" -}}\n"));
        assert!(hcl.contains("{{ end }}\nEOH\n"));
    }

    #[test]
    fn quoting_escapes_interpolation() {
        assert_eq!(quote(r#"a"b"#), r#""a\"b""#);
        assert_eq!(quote("${HOME}"), "\"$${HOME}\"");
        assert_eq!(heredoc("x"), "<<EOH\nx\nEOH");
    }
}
