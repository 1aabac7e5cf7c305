use std::io::{IsTerminal, Write};

use brickwire::frame::bytecodec::hex_dump;
use brickwire::BrickSnapshot;
use bytes::Bytes;
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct FrameOutput {
    sequence: u16,
    command_type: u8,
    length: usize,
    hex: String,
}

impl FrameOutput {
    fn new(frame: &Bytes) -> Self {
        Self {
            sequence: u16::from_le_bytes([frame[2], frame[3]]),
            command_type: frame[4],
            length: frame.len(),
            hex: hex_dump(frame),
        }
    }
}

/// Print finalized frames, length prefix included.
pub fn print_frames(frames: &[Bytes], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for frame in frames {
                print_json(&FrameOutput::new(frame));
            }
        }
        OutputFormat::Table => {
            let mut table = new_table(vec!["SEQ", "TYPE", "LEN", "BYTES"]);
            for frame in frames {
                let out = FrameOutput::new(frame);
                table.add_row(vec![
                    out.sequence.to_string(),
                    format!("0x{:02x}", out.command_type),
                    out.length.to_string(),
                    out.hex,
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for frame in frames {
                let out = FrameOutput::new(frame);
                println!(
                    "seq={} type=0x{:02x} len={} bytes={}",
                    out.sequence, out.command_type, out.length, out.hex
                );
            }
        }
        OutputFormat::Raw => {
            for frame in frames {
                print_raw(frame);
            }
        }
    }
}

/// Print `(field, value)` pairs describing one result.
pub fn print_fields<T: Serialize>(value: &T, fields: &[(&str, String)], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(value),
        OutputFormat::Table => {
            let mut table = new_table(vec!["FIELD", "VALUE"]);
            for (name, val) in fields {
                table.add_row(vec![name.to_string(), val.clone()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            let line: Vec<String> = fields
                .iter()
                .map(|(name, val)| format!("{name}={val}"))
                .collect();
            println!("{}", line.join(" "));
        }
    }
}

#[derive(Serialize)]
struct PortOutput {
    port: String,
    device: String,
    mode: u8,
    si: f32,
    raw: i32,
    percent: u8,
}

#[derive(Serialize)]
struct SnapshotOutput {
    ports: Vec<PortOutput>,
    buttons: Vec<&'static str>,
}

impl SnapshotOutput {
    fn new(snapshot: &BrickSnapshot) -> Self {
        let b = snapshot.buttons;
        let buttons = [
            ("back", b.back),
            ("left", b.left),
            ("up", b.up),
            ("right", b.right),
            ("down", b.down),
            ("enter", b.enter),
        ]
        .into_iter()
        .filter_map(|(name, held)| held.then_some(name))
        .collect();

        Self {
            ports: snapshot
                .ports
                .iter()
                .map(|p| PortOutput {
                    port: p.port.to_string(),
                    device: p.device.to_string(),
                    mode: p.mode,
                    si: p.si,
                    raw: p.raw,
                    percent: p.percent,
                })
                .collect(),
            buttons,
        }
    }
}

pub fn print_snapshot(snapshot: &BrickSnapshot, format: OutputFormat) {
    let out = SnapshotOutput::new(snapshot);
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => {
            let mut table = new_table(vec!["PORT", "DEVICE", "MODE", "SI", "RAW", "PCT"]);
            for p in &out.ports {
                table.add_row(vec![
                    p.port.clone(),
                    p.device.clone(),
                    p.mode.to_string(),
                    format!("{:.2}", p.si),
                    p.raw.to_string(),
                    p.percent.to_string(),
                ]);
            }
            println!("{table}");
            println!("buttons: {}", out.buttons.join(","));
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for p in &out.ports {
                println!(
                    "port={} device={} mode={} si={:.2} raw={} pct={}",
                    p.port, p.device, p.mode, p.si, p.raw, p.percent
                );
            }
            println!("buttons={}", out.buttons.join(","));
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}
