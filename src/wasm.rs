//! WASM bindings for Transim.
//!
//! JavaScript-friendly wrapper around [`Simulator`] for in-browser
//! visualization: step the circuit incrementally and pull samples, or run
//! the whole transient and receive JSON.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { WasmTransient } from 'transim';
//!
//! await init();
//!
//! const netlist = `
//!   V1 in 0 SIN(0 1 50)
//!   R1 in out 1k
//!   C1 out 0 10u
//!   .tran 100u 40m
//!   .print v(out)
//! `;
//!
//! const sim = new WasmTransient(netlist);
//! const out = sim.run_steps(100);   // Float64Array, signals interleaved
//! console.log(sim.signal_names(), sim.time);
//! ```

use wasm_bindgen::prelude::*;

use crate::components::StamperRegistry;
use crate::error::TransimError;
use crate::solver::{Simulator, SimulatorConfig};
use crate::{dsl, output, Netlist};

/// Initialize panic hook for better error messages in browser console.
#[wasm_bindgen(start)]
pub fn init_panic_hook() {
    console_error_panic_hook::set_once();
}

fn js_err(e: TransimError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// Incremental transient simulator.
#[wasm_bindgen]
pub struct WasmTransient {
    simulator: Simulator,
}

impl WasmTransient {
    fn build(ast: &dsl::NetlistAst, config: SimulatorConfig) -> Result<WasmTransient, JsValue> {
        let circuit = Netlist::from_ast(ast)
            .and_then(|n| n.compile(&StamperRegistry::create_default()))
            .map_err(js_err)?;
        let simulator = Simulator::new(circuit, config).map_err(js_err)?;
        Ok(WasmTransient { simulator })
    }
}

#[wasm_bindgen]
impl WasmTransient {
    /// Create a simulator from netlist text, using its `.tran`/`.method`
    /// directives or the defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(netlist: &str) -> Result<WasmTransient, JsValue> {
        let ast = dsl::parse(netlist).map_err(js_err)?;
        Self::build(&ast, ast.simulator_config(SimulatorConfig::default()))
    }

    /// Create a simulator with explicit step, stop time and method
    /// (`"be"` or `"trap"`), overriding the netlist directives.
    #[wasm_bindgen]
    pub fn with_config(
        netlist: &str,
        step: f64,
        stop_time: f64,
        method: &str,
    ) -> Result<WasmTransient, JsValue> {
        let ast = dsl::parse(netlist).map_err(js_err)?;
        let config = SimulatorConfig::new()
            .with_step(step)
            .with_stop_time(stop_time)
            .with_method(method.parse().map_err(js_err)?);
        Self::build(&ast, config)
    }

    /// Advance `count` steps and return the recorded signals after each,
    /// interleaved (`count × signal_names().length` values).
    #[wasm_bindgen]
    pub fn run_steps(&mut self, count: usize) -> Result<Vec<f64>, JsValue> {
        let mut out = Vec::with_capacity(count * self.simulator.signal_names().len());
        for _ in 0..count {
            self.simulator.step().map_err(js_err)?;
            out.extend(self.simulator.sample());
        }
        Ok(out)
    }

    /// Run the configured number of steps from the present state and
    /// return the result as JSON.
    #[wasm_bindgen]
    pub fn run_json(&mut self) -> Result<String, JsValue> {
        let result = self.simulator.run().map_err(js_err)?;
        output::to_json_string(&result).map_err(js_err)
    }

    /// Names of the recorded signals.
    #[wasm_bindgen]
    pub fn signal_names(&self) -> Vec<String> {
        self.simulator.signal_names()
    }

    /// Simulated time in seconds.
    #[wasm_bindgen(getter)]
    pub fn time(&self) -> f64 {
        self.simulator.time()
    }

    /// The voltage at a named node, or `undefined` if it doesn't exist.
    #[wasm_bindgen]
    pub fn node_voltage(&self, node_name: &str) -> Option<f64> {
        self.simulator.node_voltage(node_name)
    }

    /// The current through a named element, or `undefined`.
    #[wasm_bindgen]
    pub fn element_current(&self, element_name: &str) -> Option<f64> {
        self.simulator.element_current(element_name)
    }
}

/// Get the library version.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
