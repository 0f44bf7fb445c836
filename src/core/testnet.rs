//! In-memory network used by the unit tests.

use hashbrown::HashMap;

use crate::network::{LiveLayer, LiveNetwork, LivePathway, SynapseLayout};

#[derive(Debug, Clone)]
pub struct TestPath {
    pub sender: String,
    pub receiver: String,
    pub kind: String,
    pub vars: Vec<String>,
    pub layout: SynapseLayout,
    pub values: HashMap<String, Vec<f32>>,
}

impl LivePathway for TestPath {
    fn sender(&self) -> &str {
        &self.sender
    }

    fn receiver(&self) -> &str {
        &self.receiver
    }

    fn kind(&self) -> &str {
        &self.kind
    }

    fn syn_var_names(&self) -> &[String] {
        &self.vars
    }

    fn synapse_count(&self) -> usize {
        self.layout.synapse_count()
    }

    fn syn_values(&self, out: &mut [f32], var: &str) {
        match self.values.get(var) {
            Some(vals) => out.copy_from_slice(vals),
            None => out.fill(f32::NAN),
        }
    }

    fn layout(&self) -> &SynapseLayout {
        &self.layout
    }
}

#[derive(Debug, Clone)]
pub struct TestLayer {
    pub name: String,
    pub units: usize,
    /// Per variable: `lanes * units` values.
    pub values: HashMap<String, Vec<f32>>,
    pub send: Vec<TestPath>,
}

impl LiveLayer for TestLayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn unit_count(&self) -> usize {
        self.units
    }

    fn unit_values(&self, out: &mut [f32], var: &str, lane: usize) {
        match self.values.get(var) {
            Some(vals) => out.copy_from_slice(&vals[lane * self.units..(lane + 1) * self.units]),
            None => out.fill(f32::NAN),
        }
    }

    fn send_pathway_count(&self) -> usize {
        self.send.len()
    }

    fn send_pathway(&self, index: usize) -> &dyn LivePathway {
        &self.send[index]
    }
}

#[derive(Debug, Clone)]
pub struct TestNet {
    pub unit_vars: Vec<String>,
    pub syn_vars: Vec<String>,
    pub lanes: usize,
    pub layers: Vec<TestLayer>,
}

impl LiveNetwork for TestNet {
    fn layer_count(&self) -> usize {
        self.layers.len()
    }

    fn layer(&self, index: usize) -> &dyn LiveLayer {
        &self.layers[index]
    }

    fn unit_var_names(&self) -> &[String] {
        &self.unit_vars
    }

    fn syn_var_names(&self) -> &[String] {
        &self.syn_vars
    }

    fn lanes(&self) -> usize {
        self.lanes
    }
}

impl TestNet {
    /// Layers `L0`, `L1`, ... with the given unit counts; every value 0.
    pub fn with_layers(units: &[usize], vars: &[&str]) -> Self {
        let unit_vars: Vec<String> = vars.iter().map(|s| s.to_string()).collect();
        let layers = units
            .iter()
            .enumerate()
            .map(|(i, &n)| TestLayer {
                name: format!("L{i}"),
                units: n,
                values: unit_vars.iter().map(|v| (v.clone(), vec![0.0; n])).collect(),
                send: Vec::new(),
            })
            .collect();
        Self {
            unit_vars,
            syn_vars: Vec::new(),
            lanes: 1,
            layers,
        }
    }

    fn layer_mut(&mut self, name: &str) -> &mut TestLayer {
        self.layers
            .iter_mut()
            .find(|l| l.name == name)
            .expect("unknown test layer")
    }

    pub fn set_lanes(&mut self, lanes: usize) {
        self.lanes = lanes;
        for lay in &mut self.layers {
            for vals in lay.values.values_mut() {
                vals.resize(lanes * lay.units, 0.0);
            }
        }
    }

    pub fn set_unit(&mut self, layer: &str, var: &str, lane: usize, unit: usize, v: f32) {
        let lay = self.layer_mut(layer);
        let units = lay.units;
        lay.values.get_mut(var).expect("unknown test var")[lane * units + unit] = v;
    }

    /// Set every unit of every lane of `layer` to `v`.
    pub fn fill_unit(&mut self, layer: &str, var: &str, v: f32) {
        let lay = self.layer_mut(layer);
        lay.values.get_mut(var).expect("unknown test var").fill(v);
    }

    pub fn resize_layer(&mut self, layer: &str, units: usize) {
        let lanes = self.lanes;
        let lay = self.layer_mut(layer);
        lay.units = units;
        for vals in lay.values.values_mut() {
            vals.clear();
            vals.resize(lanes * units, 0.0);
        }
    }

    pub fn set_unit_vars(&mut self, vars: &[&str]) {
        self.unit_vars = vars.iter().map(|s| s.to_string()).collect();
        let lanes = self.lanes;
        for lay in &mut self.layers {
            let n = lay.units * lanes;
            lay.values = self
                .unit_vars
                .iter()
                .map(|v| (v.clone(), vec![0.0; n]))
                .collect();
        }
    }

    /// Fully connect `sender` to `receiver`.
    pub fn connect(&mut self, sender: &str, receiver: &str, kind: &str, vars: &[&str]) {
        let send_units = self.layer_mut(sender).units;
        let recv_units = self.layer_mut(receiver).units;
        let layout = SynapseLayout::Dense {
            send_units,
            recv_units,
        };
        self.connect_with(sender, receiver, kind, vars, layout);
    }

    pub fn connect_with(
        &mut self,
        sender: &str,
        receiver: &str,
        kind: &str,
        vars: &[&str],
        layout: SynapseLayout,
    ) {
        let n = layout.synapse_count();
        let path = TestPath {
            sender: sender.to_string(),
            receiver: receiver.to_string(),
            kind: kind.to_string(),
            vars: vars.iter().map(|s| s.to_string()).collect(),
            layout,
            values: vars.iter().map(|v| (v.to_string(), vec![0.0; n])).collect(),
        };
        for v in &path.vars {
            if !self.syn_vars.contains(v) {
                self.syn_vars.push(v.clone());
            }
        }
        self.layer_mut(sender).send.push(path);
    }

    fn path_mut(&mut self, sender: &str, receiver: &str, kind: &str) -> &mut TestPath {
        self.layer_mut(sender)
            .send
            .iter_mut()
            .find(|p| p.receiver == receiver && p.kind == kind)
            .expect("unknown test pathway")
    }

    pub fn set_syn(
        &mut self,
        sender: &str,
        receiver: &str,
        kind: &str,
        var: &str,
        syn: usize,
        v: f32,
    ) {
        self.path_mut(sender, receiver, kind)
            .values
            .get_mut(var)
            .expect("unknown syn var")[syn] = v;
    }

    /// Replace a pathway's synaptic variable list, keeping the values of
    /// variables that survive.
    pub fn set_syn_vars(&mut self, sender: &str, receiver: &str, kind: &str, vars: &[&str]) {
        let path = self.path_mut(sender, receiver, kind);
        let n = path.layout.synapse_count();
        path.vars = vars.iter().map(|s| s.to_string()).collect();
        for v in vars {
            path.values.entry(v.to_string()).or_insert_with(|| vec![0.0; n]);
        }
        for v in vars {
            if !self.syn_vars.iter().any(|s| s == v) {
                self.syn_vars.push(v.to_string());
            }
        }
    }
}
