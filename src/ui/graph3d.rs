use eframe::egui_glow;
use egui::{Align2, Color32, FontId, Rounding, mutex::Mutex};
use egui_glow::glow;
use nalgebra_glm::TVec3;
use std::sync::Arc;

/// Vertices of the reference axes drawn ahead of the trace.
const AXIS_VERTICES: usize = 6;
const FLOATS_PER_VERTEX: usize = 4;

/// Orbiting view of the traced axis on the unit sphere.
pub struct Graph3D {
    gfx: Option<Arc<Mutex<GFX>>>,
    angle: (f32, f32),
}

struct GFX {
    program: glow::Program,
    vertex_array: glow::VertexArray,
    vertex_buffer: glow::Buffer,
}

const VERTEX_SHADER_SOURCE: &str = r#"
    in vec4 aPos;
    out vec4 v_color;
    uniform float u_count;
    uniform mat4 u_matrix;
    void main() {
        if (gl_VertexID < 6) {
            int axis = gl_VertexID / 2;
            v_color = vec4(axis == 0 ? 1.0 : 0.0, axis == 2 ? 1.0 : 0.0, axis == 1 ? 1.0 : 0.0, 1.0);
            if ((gl_VertexID % 2) == 1) {
                v_color *= 0.5;
            }
        } else {
            // older samples fade out
            float age = float(gl_VertexID - 6) / max(u_count, 1.0);
            v_color = vec4(1.0, 0.85, 0.2, 1.0) * (0.25 + 0.75 * age);
        }
        gl_PointSize = 6.0;
        gl_Position = u_matrix * vec4(aPos.xyz, 1.0);
    }
"#;

const FRAGMENT_SHADER_SOURCE: &str = r#"
    precision mediump float;
    in vec4 v_color;
    out vec4 out_color;
    void main() {
        out_color = v_color;
    }
"#;

macro_rules! gl_unwrap {
    ($result:expr) => {
        match $result {
            core::result::Result::Ok(val) => val,
            core::result::Result::Err(err) => {
                log::error!("{:?}", err);
                return None;
            }
        }
    };
}

/// Reference axes followed by the trace, four floats per vertex. Axes are laid
/// out as +X/-X, +Z/-Z then +Y/-Y.
pub fn trace_vertices(trace: &[[f32; 4]]) -> Vec<f32> {
    let mut vertices = Vec::with_capacity((AXIS_VERTICES + trace.len()) * FLOATS_PER_VERTEX);
    for axis in [0, 2, 1] {
        for sign in [1.0, -1.0] {
            let mut vertex = [0.0; FLOATS_PER_VERTEX];
            vertex[axis] = sign;
            vertices.extend_from_slice(&vertex);
        }
    }

    for sample in trace {
        vertices.extend_from_slice(sample);
    }
    vertices
}

impl GFX {
    pub fn new<'a>(cc: &'a eframe::CreationContext<'a>) -> Option<Arc<Mutex<Self>>> {
        unsafe {
            let gl = cc.gl.as_ref()?;
            use glow::HasContext as _;

            let shader_version = egui_glow::ShaderVersion::get(gl);

            if !shader_version.is_new_shader_interface() {
                log::warn!("Trace view isn't available on {:?}", shader_version);
                return None;
            }

            let program = gl_unwrap!(gl.create_program());

            let mut shaders = Vec::with_capacity(2);
            for (kind, source) in [(glow::VERTEX_SHADER, VERTEX_SHADER_SOURCE), (glow::FRAGMENT_SHADER, FRAGMENT_SHADER_SOURCE)] {
                let shader = gl_unwrap!(gl.create_shader(kind));
                gl.shader_source(shader, &format!("{}\n{}", shader_version.version_declaration(), source));
                gl.compile_shader(shader);
                if !gl.get_shader_compile_status(shader) {
                    log::error!("Failed to compile trace shader: {:?}", gl.get_shader_info_log(shader));
                    return None;
                }
                gl.attach_shader(program, shader);
                shaders.push(shader);
            }

            gl.link_program(program);
            if !gl.get_program_link_status(program) {
                log::error!("Failed to link trace program: {}", gl.get_program_info_log(program));
                return None;
            }

            for shader in shaders {
                gl.detach_shader(program, shader);
                gl.delete_shader(shader);
            }

            let vertex_array = gl_unwrap!(gl.create_vertex_array());
            let vertex_buffer = gl_unwrap!(gl.create_buffer());

            gl.bind_vertex_array(Some(vertex_array));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(vertex_buffer));
            let stride = (FLOATS_PER_VERTEX * std::mem::size_of::<f32>()) as i32;
            gl.vertex_attrib_pointer_f32(0, 3, glow::FLOAT, false, stride, 0);
            gl.enable_vertex_attrib_array(0);
            gl.bind_buffer(glow::ARRAY_BUFFER, None);
            gl.bind_vertex_array(None);

            Some(Arc::new(Mutex::new(Self { program, vertex_array, vertex_buffer })))
        }
    }

    fn paint(&self, gl: &glow::Context, angle: (f32, f32), vertices: &[f32]) {
        use glow::HasContext as _;
        let count = (vertices.len() / FLOATS_PER_VERTEX).saturating_sub(AXIS_VERTICES) as i32;

        unsafe {
            let proj = nalgebra_glm::perspective_fov(std::f32::consts::PI / 6.0, 10.0, 10.0, 1.0, 100.0);

            // Z up, orbiting around it.
            let view = nalgebra_glm::look_at(
                &TVec3::new(f32::cos(angle.0) * 4.0, f32::sin(angle.0) * 4.0, f32::sin(angle.1) * 4.0),
                &TVec3::new(0.0, 0.0, 0.0),
                &TVec3::new(0.0, 0.0, 1.0),
            );

            gl.use_program(Some(self.program));
            gl.uniform_matrix_4_f32_slice(
                gl.get_uniform_location(self.program, "u_matrix").as_ref(),
                false,
                (proj * view).data.as_slice(),
            );
            gl.uniform_1_f32(gl.get_uniform_location(self.program, "u_count").as_ref(), count as f32);
            gl.bind_vertex_array(Some(self.vertex_array));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(self.vertex_buffer));
            gl.buffer_data_u8_slice(glow::ARRAY_BUFFER, vertices.align_to::<u8>().1, glow::STREAM_DRAW);

            gl.line_width(1.0);
            gl.draw_arrays(glow::LINES, 0, AXIS_VERTICES as i32);
            if count > 0 {
                gl.line_width(2.0);
                gl.draw_arrays(glow::LINE_STRIP, AXIS_VERTICES as i32, count);
                gl.enable(glow::VERTEX_PROGRAM_POINT_SIZE);
                gl.draw_arrays(glow::POINTS, AXIS_VERTICES as i32 + count - 1, 1);
                gl.disable(glow::VERTEX_PROGRAM_POINT_SIZE);
            }
        }
    }
}

impl Graph3D {
    pub fn new<'a>(cc: &'a eframe::CreationContext<'a>) -> Self { Self { gfx: GFX::new(cc), angle: (0.7, 0.3) } }

    pub fn draw(&mut self, trace: &[[f32; 4]], ui: &mut egui::Ui) {
        let (rect, response) =
            ui.allocate_exact_size(egui::Vec2::splat(ui.spacing().interact_size.y * 12.0), egui::Sense::drag());

        ui.painter().rect(rect, Rounding::ZERO, Color32::BLACK, ui.visuals().noninteractive().bg_stroke);

        let Some(gfx) = self.gfx.clone() else {
            ui.painter().text(
                rect.center(),
                Align2::CENTER_CENTER,
                "Unavailable",
                FontId::proportional(ui.spacing().interact_size.y),
                Color32::WHITE,
            );
            return;
        };

        self.angle.0 += response.drag_motion().x * 0.01;
        self.angle.1 = (self.angle.1 + response.drag_motion().y * 0.01).clamp(-1.5, 1.5);

        let angle = self.angle;
        let vertices = trace_vertices(trace);
        let cb = egui_glow::CallbackFn::new(move |_info, painter| {
            gfx.lock().paint(painter.gl(), angle, &vertices);
        });

        let callback = egui::PaintCallback {
            rect: rect.shrink(ui.visuals().noninteractive().bg_stroke.width),
            callback: Arc::new(cb),
        };
        ui.painter().add(callback);
    }
}
