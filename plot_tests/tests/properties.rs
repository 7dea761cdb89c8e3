//! End-to-end checks of the core rendering and navigation guarantees.

use std::time::Duration;

use plot_shared::{
    assemble::{assemble, census},
    camera::{Camera, CameraOp},
    color::Rgba,
    element::{Element, Label, Quad, ViewContext, DEFAULT_NEAR_CLIP},
    expr::MevalEvaluator,
    math::Vec3,
    persist::{decode_scene, encode_scene, SCENE_SIGNATURE},
    render::{painter_sort, DrawCommand, RecordingSurface, Renderer},
    scene::{FogSettings, RenderMode, Scene},
    tessellate::{auto_z_range, tessellate_bins, BinGrid},
};
use plot_tests::{init_tracing, sample_view};
use plot_view::controller::{CameraController, TickOutcome};

const EPS: f64 = 1e-9;

fn looking_along_z() -> anyhow::Result<Camera> {
    Ok(Camera::new(Vec3::ZERO, Vec3::UNIT_Z, Vec3::UNIT_Y)?)
}

#[test]
fn on_axis_points_project_to_centre_at_their_depth() -> anyhow::Result<()> {
    let cam = looking_along_z()?;
    for d in [0.01, 0.3, 2.0, 55.0] {
        let p = cam.project(Vec3::new(0.0, 0.0, d));
        assert!((p.z - d).abs() < EPS);
        assert!(p.x.abs() < EPS && p.y.abs() < EPS);
    }
    Ok(())
}

#[test]
fn basis_stays_orthonormal_under_navigation() -> anyhow::Result<()> {
    let mut cam = Camera::default();
    let ops = [
        CameraOp::Rotate { dx: 0.3, dy: 0.2 },
        CameraOp::Bank(0.4),
        CameraOp::Pivot {
            dx: 1.1,
            dy: -0.7,
            distance: 5.0,
        },
        CameraOp::Rotate { dx: -2.0, dy: 1.4 },
        CameraOp::Rotate { dx: 0.0, dy: 1.6 },
        CameraOp::Bank(-1.2),
        CameraOp::Pivot {
            dx: -0.2,
            dy: 3.0,
            distance: 2.0,
        },
    ];
    for _ in 0..20 {
        for op in ops {
            cam.apply(op);
            let (dir, right, up) = (cam.eye_direction(), cam.screen_right(), cam.screen_up());
            assert!((dir.len() - 1.0).abs() < 1e-6);
            assert!((right.len() - 1.0).abs() < 1e-6);
            assert!((up.len() - 1.0).abs() < 1e-6);
            assert!(right.dot(dir).abs() < 1e-6);
            assert!(up.dot(dir).abs() < 1e-6);
        }
    }
    Ok(())
}

#[test]
fn fully_fogged_elements_are_dropped() -> anyhow::Result<()> {
    let fog = FogSettings::new(true, 2.0, 10.0)?;
    let blends: Vec<f64> = (0..200).map(|i| fog.blend(i as f64 * 0.1)).collect();
    assert!(blends.windows(2).all(|w| w[0] <= w[1]));
    assert!(blends.iter().all(|b| (0.0..=1.0).contains(b)));

    let mut scene = Scene::new("fog", looking_along_z()?);
    scene.fog = fog;
    let ctx = ViewContext::new(&scene, DEFAULT_NEAR_CLIP);
    let square = |z: f64| {
        [
            Vec3::new(-1.0, -1.0, z),
            Vec3::new(1.0, -1.0, z),
            Vec3::new(1.0, 1.0, z),
            Vec3::new(-1.0, 1.0, z),
        ]
    };
    let near = Element::from(Quad::new(&ctx, square(5.0), Some(Rgba::BLACK), None));
    let far = Element::from(Quad::new(&ctx, square(10.0), Some(Rgba::BLACK), None));
    assert!(near.is_renderable());
    assert!(!far.is_renderable());
    Ok(())
}

#[test]
fn painter_order_is_farthest_first() -> anyhow::Result<()> {
    let scene = Scene::new("painter", looking_along_z()?);
    let ctx = ViewContext::new(&scene, DEFAULT_NEAR_CLIP);
    let mut elements: Vec<Element> = [5.0, 1.0, 3.0]
        .into_iter()
        .map(|d| Label::new(&ctx, Vec3::new(0.0, 0.0, d), format!("{d}"), Rgba::BLACK).into())
        .collect();
    painter_sort(&mut elements);

    let mut surface = RecordingSurface::default();
    for e in &elements {
        e.render(&mut surface);
    }
    let drawn: Vec<&str> = surface
        .commands()
        .iter()
        .filter_map(|c| match c {
            DrawCommand::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(drawn, vec!["5", "3", "1"]);
    Ok(())
}

#[test]
fn momentum_settles_within_bounded_ticks() -> anyhow::Result<()> {
    let mut ctl = CameraController::default();
    let mut cam = Camera::default();
    ctl.velocity_mut().rotate[0].current = 2.0;
    ctl.velocity_mut().forward.current = -1.5;

    let mut ticks = 0;
    while ctl.tick(&mut cam, Duration::from_millis(50)) == TickOutcome::Moving {
        ticks += 1;
        assert!(ticks < 200, "momentum did not settle");
    }
    assert!(!ctl.is_animating());
    assert!(ctl.velocity().is_settled(ctl.config().epsilon));
    Ok(())
}

#[tokio::test]
async fn animation_loop_stops_by_itself() -> anyhow::Result<()> {
    init_tracing();
    let mut view = sample_view()?;
    view.handle_input(plot_view::input::InputEvent::KeyDown(
        plot_view::input::NavKey::PivotLeft,
    ));
    let before = view.camera_position();
    // Key held: the loop runs to the cap.
    assert_eq!(view.run_momentum(4).await, 4);
    assert!((view.camera_position() - before).len() > 0.0);

    view.handle_input(plot_view::input::InputEvent::KeyUp(
        plot_view::input::NavKey::PivotLeft,
    ));
    let ticks = view.run_momentum(500).await;
    assert!(ticks < 500);
    assert!(!view.is_animating());
    Ok(())
}

#[test]
fn division_by_zero_only_loses_touching_quads() -> anyhow::Result<()> {
    let mut scene = Scene::default();
    scene.show_axes = false;
    let i = scene.add_function();
    let f = scene.function_mut(i)?;
    f.set_expression("z = 0.1 / (x*x + y*y)");
    f.set_grid_divs(5, 5)?;
    scene.refresh(&mut MevalEvaluator::new());

    let grid = &scene.function(i)?.tessellation().expect("tessellated").grid;
    assert_eq!(grid.nan_count(), 1);
    assert!(grid.get(2, 2).is_nan());

    let ctx = ViewContext::new(&scene, DEFAULT_NEAR_CLIP);
    let frame = assemble(&scene, &ctx);
    assert_eq!(census(&frame.elements), (0, 12, 0));
    assert_eq!(frame.culled, 4);
    Ok(())
}

#[test]
fn serialized_scene_round_trips() -> anyhow::Result<()> {
    let mut view = sample_view()?;
    view.set_fog(true, 4.0, 12.0)?;
    view.set_render_mode(RenderMode::Wireframe);
    view.handle_input(plot_view::input::InputEvent::Wheel { delta: 1.0 });

    let scene = view.scene();
    let bytes = encode_scene(scene, SCENE_SIGNATURE)?;
    let back = decode_scene(&bytes, SCENE_SIGNATURE)?;

    assert_eq!(back.camera, scene.camera);
    assert_eq!(back.fog, scene.fog);
    assert_eq!(back.mode, RenderMode::Wireframe);
    let summary = |s: &Scene| {
        s.functions()
            .iter()
            .map(|f| {
                (
                    f.name.clone(),
                    f.expression().map(str::to_string),
                    f.surface_color,
                    f.grid_divs(),
                    f.is_curve(),
                )
            })
            .collect::<Vec<_>>()
    };
    assert_eq!(summary(&back), summary(scene));
    assert_eq!(back.functions().len(), 2);
    Ok(())
}

#[test]
fn histogram_range_rounds_to_nice_bounds() -> anyhow::Result<()> {
    assert_eq!(auto_z_range(-3.0, 47.0), (-5.0, 100.0));

    let bins = BinGrid::new(
        vec![vec![-3.0, 10.0, 47.0], vec![0.0, 5.0, 20.0]],
        (0.0, 3.0),
        (0.0, 2.0),
    )?;
    let (tess, range) = tessellate_bins(&bins);
    assert_eq!(range, (-5.0, 100.0));
    assert_eq!(tess.grid.dims(), (3, 2));
    Ok(())
}

#[test]
fn wireframe_draws_lines_only() -> anyhow::Result<()> {
    let mut view = sample_view()?;
    view.set_render_mode(RenderMode::Wireframe);
    let mut surface = RecordingSurface::default();
    let stats = view.render(400, 300, &mut surface)?;
    assert_eq!(stats.mode, RenderMode::Wireframe);
    assert!(stats.elements > 0);
    assert!(surface.commands().iter().all(|c| !matches!(
        c,
        DrawCommand::FillPolygon(_) | DrawCommand::PolygonOutline(_) | DrawCommand::Text { .. }
    )));
    Ok(())
}

#[test]
fn solid_mode_renders_every_assembled_element() -> anyhow::Result<()> {
    let mut view = sample_view()?;
    view.refresh();
    let ctx = ViewContext::new(view.scene(), DEFAULT_NEAR_CLIP);
    let expected = assemble(view.scene(), &ctx).elements.len();

    let mut surface = RecordingSurface::default();
    let stats = Renderer::default().render(view.scene(), &mut surface);
    assert_eq!(stats.elements, expected);
    Ok(())
}
