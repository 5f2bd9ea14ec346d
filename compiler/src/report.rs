// report.rs — HTML schedule report
//
// Renders a self-contained HTML document summarizing a compiled engine:
// global parameters, the FIR bank, the per-MAC slot occupancy map (one row
// per time slot, colored by FIR), and each MAC's FIFO memory map. Purely a
// diagnostic surface; nothing here feeds the RTL.
//
// Preconditions: binding and lowering complete.
// Postconditions: output is deterministic for identical inputs.
// Failure modes: none.
// Side effects: none.

use std::fmt::Write as _;

use crate::bind::BoundEngine;
use crate::lower::LoweredEngine;
use crate::spec::EngineSpec;

const CSS: &str = "\
<style type=\"text/css\">
h1 { font-size: 36pt; color: #1C1259; line-height: 1em; }
h2 { font-size: 24pt; color: #1C1259; }
h2:after { content: ' '; display: block; border: 2px solid black; }
body { color: #666; font: 12pt \"Open Sans\", Helvetica, Arial, sans-serif; margin: 6pt 10pt; }
table.t1 { margin: 12pt 0 12pt 90pt; border-collapse: collapse; }
table.t1 td, table.t1 th { border: 1px solid #aaa; padding: 2pt 8pt; }
table.t1 th { background: #eee; }
</style>
";

/// Render the engine report as a complete HTML document.
pub fn render_report(
    engine_name: &str,
    spec: &EngineSpec,
    bound: &BoundEngine,
    lowered: &LoweredEngine,
) -> String {
    let mut html = String::new();
    let _ = writeln!(html, "<!DOCTYPE html>");
    let _ = writeln!(html, "<html><head>");
    let _ = writeln!(html, "<title>FirEngine {engine_name}</title>");
    html.push_str(CSS);
    let _ = writeln!(html, "</head><body>");
    let _ = writeln!(html, "<h1>FirEngine {engine_name}</h1>");

    render_summary(&mut html, engine_name, spec, lowered);
    render_fir_bank(&mut html, spec, bound);
    render_slot_map(&mut html, bound);
    render_memory_map(&mut html, lowered);

    let _ = writeln!(html, "</body></html>");
    html
}

fn render_summary(html: &mut String, engine_name: &str, spec: &EngineSpec, lowered: &LoweredEngine) {
    let _ = writeln!(html, "<h2>Feature Summary</h2>");
    let _ = writeln!(html, "<table class=\"t1\">");
    let _ = writeln!(
        html,
        "<tr><th>FirEngineName</th><td>{engine_name}</td></tr>"
    );
    let _ = writeln!(
        html,
        "<tr><th>ClockFreq</th><td>{}</td></tr>",
        spec.params.clock_freq
    );
    let _ = writeln!(
        html,
        "<tr><th>NumTimeSlots</th><td>{}</td></tr>",
        spec.params.num_time_slots
    );
    let _ = writeln!(html, "<tr><th>NumFirs</th><td>{}</td></tr>", lowered.num_firs);
    let _ = writeln!(html, "<tr><th>NumMacs</th><td>{}</td></tr>", lowered.num_macs);
    let _ = writeln!(html, "</table>");
}

fn render_fir_bank(html: &mut String, spec: &EngineSpec, bound: &BoundEngine) {
    let _ = writeln!(html, "<h2>FIR Bank</h2>");
    let _ = writeln!(html, "<table class=\"t1\">");
    let _ = writeln!(
        html,
        "<tr><th>Fir#</th><th>Colour</th><th>SampleRate</th><th>Taps</th>\
         <th>Mac</th><th>Phase</th><th>Interval</th></tr>"
    );
    let num_firs = spec.firs.len();
    for (index, fir) in spec.firs.iter().enumerate() {
        let binding = &bound.bindings[index];
        let _ = writeln!(
            html,
            "<tr><td>{index}</td><td style=\"background: {}\"></td><td>{}</td>\
             <td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            rainbow_color(index as f64 / num_firs as f64),
            fir.sample_rate,
            fir.coeffs.len(),
            binding.mac.0,
            binding.phase_origin,
            binding.interval,
        );
    }
    let _ = writeln!(html, "</table>");
}

fn render_slot_map(html: &mut String, bound: &BoundEngine) {
    let _ = writeln!(html, "<h2>Schedule</h2>");
    let _ = writeln!(html, "<table class=\"t1\">");
    let mut header = String::from("<tr><th>TimeSlot</th>");
    for mac in 0..bound.num_macs() {
        let _ = write!(header, "<th>FirMac{mac}</th>");
    }
    header.push_str("</tr>");
    let _ = writeln!(html, "{header}");

    let num_firs = bound.num_firs.max(1) as f64;
    for slot in 0..bound.num_time_slots {
        let _ = write!(html, "<tr><td>{slot}</td>");
        for mac in &bound.macs {
            let coeff = mac.coeff_slots[slot as usize];
            let update = mac.update_slots[slot as usize];
            match coeff {
                Some(tap) => {
                    let _ = write!(
                        html,
                        "<td style=\"background: {}\">",
                        rainbow_color(f64::from(tap.fir.0) / num_firs)
                    );
                }
                None => {
                    let _ = write!(html, "<td>");
                }
            }
            if update.is_some() {
                html.push_str("Update");
            }
            html.push_str("</td>");
        }
        let _ = writeln!(html, "</tr>");
    }
    let _ = writeln!(html, "</table>");
}

fn render_memory_map(html: &mut String, lowered: &LoweredEngine) {
    let _ = writeln!(html, "<h2>FIFO Memory Map</h2>");
    for mac in &lowered.macs {
        let _ = writeln!(html, "<h3>FirMac{}</h3>", mac.mac.0);
        let _ = writeln!(html, "<table class=\"t1\">");
        let _ = writeln!(
            html,
            "<tr><th>Fifo#</th><th>Fir</th><th>Offset</th><th>Words</th>\
             <th>Depth</th><th>Descriptor</th></tr>"
        );
        for (index, entry) in mac.fifo_layout.entries.iter().enumerate() {
            let _ = writeln!(
                html,
                "<tr><td>{index}</td><td>{}</td><td>{}</td><td>{}</td>\
                 <td>{}</td><td>0x{:04x}</td></tr>",
                entry.fir.0, entry.offset, entry.mem_words, entry.depth, entry.packed,
            );
        }
        let _ = writeln!(html, "</table>");
    }
}

/// Map `f` in [0, 1) onto a red-to-magenta rainbow as `#rrggbb`.
fn rainbow_color(f: f64) -> String {
    let f = f.clamp(0.0, 0.999);
    let x = (f * 5.0).floor();
    let y = ((f * 5.0) - x) * 255.0;
    let y = y as u32;
    let (r, g, b) = match x as u32 {
        0 => (255, y, 0),
        1 => (255 - y, 255, 0),
        2 => (0, 255, y),
        3 => (0, 255 - y, 255),
        _ => (y, 0, 255),
    };
    format!("#{:06x}", (r << 16) + (g << 8) + b)
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Span;
    use crate::bind::bind;
    use crate::lower::lower;
    use crate::spec::{EngineParams, EngineSpec, FirSpec};
    use chumsky::span::Span as _;

    fn dummy_span() -> Span {
        Span::new((), 0..0)
    }

    fn render() -> String {
        let spec = EngineSpec {
            params: EngineParams {
                clock_freq: 400.0,
                num_time_slots: 16,
            },
            firs: vec![
                FirSpec {
                    sample_rate: 50,
                    coeffs: vec![0.25, 0.5, 0.25, 0.125],
                    span: dummy_span(),
                },
                FirSpec {
                    sample_rate: 50,
                    coeffs: vec![0.5, 0.5],
                    span: dummy_span(),
                },
            ],
        };
        let bound = bind(&spec).engine.unwrap();
        let lowered = lower(&spec, &bound, dummy_span()).lowered.unwrap();
        render_report("lowpass", &spec, &bound, &lowered)
    }

    #[test]
    fn report_is_complete_document() {
        let html = render();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<h1>FirEngine lowpass</h1>"));
        assert!(html.ends_with("</body></html>\n"));
    }

    #[test]
    fn report_lists_bindings_and_slots() {
        let html = render();
        assert!(html.contains("<tr><th>FirEngineName</th><td>lowpass</td></tr>"));
        assert!(html.contains("<th>FirMac0</th>"));
        assert!(html.contains("Update"));
        assert!(html.contains("<h2>FIFO Memory Map</h2>"));
    }

    #[test]
    fn report_is_deterministic() {
        assert_eq!(render(), render());
    }

    #[test]
    fn rainbow_endpoints() {
        assert_eq!(rainbow_color(0.0), "#ff0000");
        assert_eq!(rainbow_color(0.5), "#00ff7f");
        assert_eq!(rainbow_color(0.999), "#fd00ff");
    }
}
