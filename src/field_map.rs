//! Tabla declarada de renombrado de campos entre el vocabulario que usa el LLM
//! y el esquema del servicio de consultas.
//!
//! Las reglas se aplican a las claves de primer nivel del filtro y, de forma
//! recursiva, a cada rama de `$and`, `$or` y `$nor`.

use anyhow::{anyhow, Result};
use serde_json::{Map, Value};

const LOGICAL_OPERATORS: [&str; 3] = ["$and", "$or", "$nor"];

/// Una regla `from -> to`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRename {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMap {
    rules: Vec<FieldRename>,
}

impl Default for FieldMap {
    /// El modelo suele hablar de "phone"; la colección guarda el dato en `mobile`.
    fn default() -> Self {
        Self::new(vec![
            FieldRename { from: "phone".to_string(), to: "mobile".to_string() },
            FieldRename { from: "phone_number".to_string(), to: "mobile".to_string() },
        ])
    }
}

impl FieldMap {
    pub fn new(rules: Vec<FieldRename>) -> Self {
        Self { rules }
    }

    /// Lee una tabla con el formato `origen=destino,origen=destino`.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut rules = Vec::new();
        for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (from, to) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("Regla de renombrado sin '=': '{pair}'"))?;
            let (from, to) = (from.trim(), to.trim());
            if from.is_empty() || to.is_empty() || from == to {
                return Err(anyhow!("Regla de renombrado no válida: '{pair}'"));
            }
            rules.push(FieldRename { from: from.to_string(), to: to.to_string() });
        }
        Ok(Self::new(rules))
    }

    pub fn rules(&self) -> &[FieldRename] {
        &self.rules
    }

    /// Aplica la tabla sobre el filtro. Devuelve cuántas claves se renombraron.
    ///
    /// Si el filtro ya trae la clave destino, ésta conserva su valor y la clave
    /// heredada se descarta: la clave heredada nunca llega al servicio.
    pub fn apply(&self, filter: &mut Value) -> usize {
        match filter {
            Value::Object(map) => self.apply_to_object(map),
            _ => 0,
        }
    }

    fn apply_to_object(&self, map: &mut Map<String, Value>) -> usize {
        let mut renamed = 0;
        for rule in &self.rules {
            if let Some(value) = map.remove(&rule.from) {
                renamed += 1;
                if !map.contains_key(&rule.to) {
                    map.insert(rule.to.clone(), value);
                }
            }
        }

        for op in LOGICAL_OPERATORS {
            if let Some(Value::Array(branches)) = map.get_mut(op) {
                for branch in branches.iter_mut() {
                    renamed += self.apply(branch);
                }
            }
        }
        renamed
    }
}
