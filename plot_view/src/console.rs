//! Console command interpreter.
//!
//! Provides:
//! - Line parsing with quoted arguments
//! - Command dispatch onto [`PlotView`]
//! - Bounded command history
//!
//! Function indices are zero-based. Axes are named `x`, `y`, `z` or
//! numbered `0..=2`.

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context};
use plot_shared::{color::Rgba, scene::RenderMode};
use tracing::debug;

use crate::{
    input::{InputEvent, Modifiers, NavKey, PointerButton},
    svg::SvgSurface,
    view::PlotView,
};

const HELP: &[&str] = &[
    "fov <degrees>                     field of view",
    "fog on|off [start end]            distance fog",
    "bg <r> <g> <b>                    background color",
    "add                               add a surface, prints its index",
    "remove <i>                        remove function i",
    "expr <i> \"<definition>\"           e.g. expr 0 \"z = x*x - y*y\"",
    "grid <i> <u> [v]                  sampling resolution",
    "curve <i> on|off                  plot as a curve",
    "fill <i> on|off                   filled faces or grid lines",
    "color <i> curve|surface <r> <g> <b>",
    "width <i> <w> [abs|rel]           curve width",
    "show <i> on|off                   visibility",
    "name <i> <name>                   rename",
    "axis <x|y|z> <min> <max>          axis range",
    "axis <x|y|z> on|off               axis visibility",
    "axes on|off | axes ticks <inc> <labels>",
    "mode solid|wire                   render mode",
    "key down|up <key>                 hold or release a navigation key",
    "drag <dx> <dy> [ctrl] [alt] [shift] [middle]",
    "wheel <delta>                     dolly",
    "look <x> <y> <z>                  aim the camera",
    "render [file.svg]                 write the current frame",
    "save <file> | load <file>         scene persistence",
    "measure <i>                       curve length or surface area",
    "status | pos | history | help | quit",
];

/// Interprets console lines against a view.
pub struct Console {
    history: Vec<String>,
    max_history: usize,
    output: PathBuf,
}

impl Console {
    /// `output` is where `render` writes when no file is given.
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            history: Vec::new(),
            max_history: 100,
            output: output.into(),
        }
    }

    /// Gets command history.
    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// Executes one console line and returns the lines to print.
    pub fn exec(&mut self, view: &mut PlotView, line: &str) -> anyhow::Result<Vec<String>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with("//") {
            return Ok(Vec::new());
        }

        self.history.push(line.to_string());
        if self.history.len() > self.max_history {
            self.history.remove(0);
        }

        let tokens = parse_command_line(line);
        let Some((cmd, args)) = tokens.split_first() else {
            return Ok(Vec::new());
        };
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        debug!(command = %cmd, ?args, "Console command");

        self.dispatch(view, cmd, &args)
            .with_context(|| format!("command '{}'", cmd))
    }

    fn dispatch(&mut self, view: &mut PlotView, cmd: &str, args: &[&str]) -> anyhow::Result<Vec<String>> {
        match (cmd, args) {
            ("fov", [deg]) => {
                view.set_fov(number(deg)?)?;
                done(format!("fov = {deg}"))
            }
            ("fog", [state]) => {
                let fog = view.scene().fog;
                view.set_fog(on_off(state)?, fog.start(), fog.end())?;
                done(format!("fog {state}"))
            }
            ("fog", [state, start, end]) => {
                view.set_fog(on_off(state)?, number(start)?, number(end)?)?;
                done(format!("fog {state} {start}..{end}"))
            }
            ("bg", rgb) => {
                view.set_background(color(rgb)?);
                done("background set".to_string())
            }
            ("add", []) => {
                let i = view.add_function();
                done(format!("added function {i}"))
            }
            ("remove", [i]) => {
                let f = view.remove_function(index(i)?)?;
                done(format!("removed '{}'", f.name))
            }
            ("expr", [i, rest @ ..]) if !rest.is_empty() => {
                let definition = rest.join(" ");
                view.set_expression(index(i)?, &definition)?;
                done(format!("function {i}: {definition}"))
            }
            ("grid", [i, u]) => {
                let u = count(u)?;
                view.set_grid(index(i)?, u, u)?;
                done(format!("grid {u}x{u}"))
            }
            ("grid", [i, u, v]) => {
                let (u, v) = (count(u)?, count(v)?);
                view.set_grid(index(i)?, u, v)?;
                done(format!("grid {u}x{v}"))
            }
            ("curve", [i, state]) => {
                view.set_curve(index(i)?, on_off(state)?)?;
                done(format!("curve {state}"))
            }
            ("fill", [i, state]) => {
                view.set_fill(index(i)?, on_off(state)?)?;
                done(format!("fill {state}"))
            }
            ("color", [i, which, rgb @ ..]) => {
                let (i, c) = (index(i)?, color(rgb)?);
                match *which {
                    "curve" => view.set_curve_color(i, c)?,
                    "surface" => view.set_surface_color(i, c)?,
                    other => bail!("expected curve or surface, got '{}'", other),
                }
                done(format!("{which} color {}", c.to_hex()))
            }
            ("width", [i, w, mode @ ..]) => {
                let absolute = match mode {
                    [] | ["abs"] => true,
                    ["rel"] => false,
                    _ => bail!("expected abs or rel"),
                };
                let w: i32 = w.parse().with_context(|| format!("bad width '{}'", w))?;
                view.set_curve_width(index(i)?, w, absolute)?;
                done(format!("width {w}"))
            }
            ("show", [i, state]) => {
                view.set_visible(index(i)?, on_off(state)?)?;
                done(format!("function {i} {state}"))
            }
            ("name", [i, name]) => {
                view.set_name(index(i)?, name)?;
                done(format!("function {i} is '{name}'"))
            }
            ("axis", [a, state]) => {
                view.set_axis_shown(axis(a)?, on_off(state)?)?;
                done(format!("axis {a} {state}"))
            }
            ("axis", [a, min, max]) => {
                view.set_axis_range(axis(a)?, number(min)?, number(max)?)?;
                done(format!("axis {a} {min}..{max}"))
            }
            ("axes", ["ticks", inc, labels]) => {
                view.set_ticks(number(inc)?, number(labels)?)?;
                done(format!("ticks every {inc}, labels every {labels}"))
            }
            ("axes", [state]) => {
                view.set_axes_shown(on_off(state)?);
                done(format!("axes {state}"))
            }
            ("mode", [m]) => {
                let mode = match *m {
                    "solid" => RenderMode::Solid,
                    "wire" | "wireframe" => RenderMode::Wireframe,
                    other => bail!("unknown mode '{}'", other),
                };
                view.set_render_mode(mode);
                done(format!("mode {m}"))
            }
            ("key", [dir, key]) => {
                let key: NavKey = key.parse()?;
                let event = match *dir {
                    "down" => InputEvent::KeyDown(key),
                    "up" => InputEvent::KeyUp(key),
                    other => bail!("expected down or up, got '{}'", other),
                };
                view.handle_input(event);
                done(format!("{key} {dir}"))
            }
            ("drag", [dx, dy, flags @ ..]) => {
                let mut modifiers = Modifiers::default();
                let mut button = PointerButton::Primary;
                for flag in flags {
                    match *flag {
                        "ctrl" => modifiers.ctrl = true,
                        "alt" => modifiers.alt = true,
                        "shift" => modifiers.shift = true,
                        "middle" => button = PointerButton::Middle,
                        "right" => button = PointerButton::Secondary,
                        other => bail!("unknown drag flag '{}'", other),
                    }
                }
                let moved = view.handle_input(InputEvent::Drag {
                    dx: number(dx)?,
                    dy: number(dy)?,
                    button,
                    modifiers,
                });
                done(if moved { "moved" } else { "rejected" }.to_string())
            }
            ("wheel", [delta]) => {
                view.handle_input(InputEvent::Wheel {
                    delta: number(delta)?,
                });
                done(position(view))
            }
            ("look", [x, y, z]) => {
                let target = plot_shared::math::Vec3::new(number(x)?, number(y)?, number(z)?);
                if !view.look_at(target) {
                    bail!("cannot look at that point from here");
                }
                done(position(view))
            }
            ("render", rest) => {
                let path = match rest {
                    [] => self.output.clone(),
                    [p] => PathBuf::from(p),
                    _ => bail!("usage: render [file]"),
                };
                let (w, h) = (view.config().width, view.config().height);
                let mut svg = SvgSurface::new(w, h);
                let stats = view.render(w, h, &mut svg)?;
                svg.write_to(&path)?;
                done(format!(
                    "rendered {} elements ({} culled) to {}",
                    stats.elements,
                    stats.culled,
                    path.display()
                ))
            }
            ("save", [path]) => {
                view.save(path)?;
                done(format!("saved {path}"))
            }
            ("load", [path]) => {
                view.load(path)?;
                done(format!("loaded {path}"))
            }
            ("measure", [i]) => {
                let i = index(i)?;
                let what = if view.function(i)?.is_curve() {
                    "length"
                } else {
                    "area"
                };
                let m = view.measure(i)?;
                done(format!("{what} = {m:.6}"))
            }
            ("status", []) => Ok(status(view)),
            ("pos", []) => done(position(view)),
            ("history", []) => Ok(self.history.clone()),
            ("help", _) => Ok(HELP.iter().map(|s| s.to_string()).collect()),
            _ => Ok(vec![format!("Unknown command: {} (try 'help')", cmd)]),
        }
    }
}

fn done(msg: String) -> anyhow::Result<Vec<String>> {
    Ok(vec![msg])
}

fn status(view: &PlotView) -> Vec<String> {
    let scene = view.scene();
    let mut out = vec![
        format!("Title: {}", scene.title),
        format!("Mode: {:?}", scene.mode),
        format!("Fov: {}", scene.camera.fov_degrees()),
        position(view),
        format!("Animating: {}", view.is_animating()),
    ];
    let mut held: Vec<String> = view.controller().held_keys().map(|k| k.to_string()).collect();
    if !held.is_empty() {
        held.sort();
        out.push(format!("Held: {}", held.join(" ")));
    }
    for (i, f) in scene.functions().iter().enumerate() {
        let (u, v) = f.grid_divs();
        out.push(format!(
            "  [{i}] {} {} {}x{} {}{}",
            f.name,
            f.expression().unwrap_or("<histogram>"),
            u,
            v,
            if f.is_curve() { "curve" } else { "surface" },
            if f.visible { "" } else { " (hidden)" },
        ));
    }
    out
}

fn position(view: &PlotView) -> String {
    let cam = view.camera();
    let (p, d) = (cam.eye_position(), cam.eye_direction());
    format!(
        "eye ({:.3}, {:.3}, {:.3}) dir ({:.3}, {:.3}, {:.3})",
        p.x, p.y, p.z, d.x, d.y, d.z
    )
}

fn number(s: &str) -> anyhow::Result<f64> {
    let v: f64 = s.parse().with_context(|| format!("not a number: '{}'", s))?;
    if !v.is_finite() {
        bail!("not a finite number: '{}'", s);
    }
    Ok(v)
}

fn index(s: &str) -> anyhow::Result<usize> {
    s.parse()
        .with_context(|| format!("not a function index: '{}'", s))
}

fn count(s: &str) -> anyhow::Result<usize> {
    s.parse().with_context(|| format!("not a count: '{}'", s))
}

fn on_off(s: &str) -> anyhow::Result<bool> {
    match s {
        "on" | "true" | "1" => Ok(true),
        "off" | "false" | "0" => Ok(false),
        other => Err(anyhow!("expected on or off, got '{}'", other)),
    }
}

fn axis(s: &str) -> anyhow::Result<usize> {
    match s {
        "x" | "0" => Ok(0),
        "y" | "1" => Ok(1),
        "z" | "2" => Ok(2),
        other => bail!("unknown axis '{}'", other),
    }
}

fn color(args: &[&str]) -> anyhow::Result<Rgba> {
    let channel = |s: &str| -> anyhow::Result<i32> {
        s.parse().with_context(|| format!("bad color channel '{}'", s))
    };
    match args {
        [r, g, b] => Ok(Rgba::from_ints(channel(r)?, channel(g)?, channel(b)?, 255)),
        [r, g, b, a] => Ok(Rgba::from_ints(
            channel(r)?,
            channel(g)?,
            channel(b)?,
            channel(a)?,
        )),
        _ => bail!("expected <r> <g> <b> [a]"),
    }
}

/// Parses a command line into tokens, respecting quotes.
fn parse_command_line(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in line.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
            }
            ' ' | '\t' if !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            _ => {
                current.push(c);
            }
        }
    }

    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use plot_shared::config::ViewConfig;

    fn setup() -> (Console, PlotView) {
        let view = PlotView::new(ViewConfig::default()).unwrap();
        (Console::new("unused.svg"), view)
    }

    #[test]
    fn parse_quoted_args() {
        let tokens = parse_command_line(r#"expr 0 "z = x * y" now"#);
        assert_eq!(tokens, vec!["expr", "0", "z = x * y", "now"]);
    }

    #[test]
    fn commands_drive_the_view() {
        let (mut console, mut view) = setup();
        assert_eq!(console.exec(&mut view, "add").unwrap(), vec!["added function 0"]);
        console.exec(&mut view, r#"expr 0 "z = x*y""#).unwrap();
        console.exec(&mut view, "grid 0 8 6").unwrap();
        console.exec(&mut view, "color 0 surface 255 0 0").unwrap();
        console.exec(&mut view, "axis y -2 3").unwrap();
        console.exec(&mut view, "mode wire").unwrap();

        let f = view.function(0).unwrap();
        assert_eq!(f.expression(), Some("z = x*y"));
        assert_eq!(f.grid_divs(), (8, 6));
        assert_eq!(f.surface_color, Rgba::rgb(255, 0, 0));
        assert_eq!(view.scene().axes.axes[1].range(), (-2.0, 3.0));
        assert_eq!(view.scene().mode, RenderMode::Wireframe);
    }

    #[test]
    fn errors_carry_command_context() {
        let (mut console, mut view) = setup();
        let err = console.exec(&mut view, "fov 200").unwrap_err();
        assert!(format!("{err:#}").contains("command 'fov'"));
        let out = console.exec(&mut view, "teleport").unwrap();
        assert!(out[0].starts_with("Unknown command"));
    }

    #[test]
    fn status_lists_held_keys() {
        let (mut console, mut view) = setup();
        console.exec(&mut view, "key down pivot-left").unwrap();
        console.exec(&mut view, "key down forward").unwrap();
        let out = console.exec(&mut view, "status").unwrap();
        assert!(out.contains(&"Held: forward pivot-left".to_string()));

        console.exec(&mut view, "key up forward").unwrap();
        console.exec(&mut view, "key up pivot-left").unwrap();
        let out = console.exec(&mut view, "status").unwrap();
        assert!(!out.iter().any(|l| l.starts_with("Held:")));
    }

    #[test]
    fn history_is_bounded() {
        let (mut console, mut view) = setup();
        for _ in 0..150 {
            console.exec(&mut view, "pos").unwrap();
        }
        assert_eq!(console.history().len(), 100);
    }
}
