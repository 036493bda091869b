use crate::engine::features::{RawInputs, TimeDiffMode, DRIVER_CODES, GRID_POSITIONS};

/// One editable input on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputField {
    GridPosition,
    LapTime,
    BestQuali,
    RacePace,
    Sector1Time,
    Sector2Time,
    Sector3Time,
    DriverEncoded,
    AvgPrevPositions,
    AvgPrevPoints,
    TimeDiffFromFastest,
}

pub const FIELDS: [InputField; 11] = [
    InputField::GridPosition,
    InputField::LapTime,
    InputField::BestQuali,
    InputField::RacePace,
    InputField::Sector1Time,
    InputField::Sector2Time,
    InputField::Sector3Time,
    InputField::DriverEncoded,
    InputField::AvgPrevPositions,
    InputField::AvgPrevPoints,
    InputField::TimeDiffFromFastest,
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldType {
    /// Slider with inclusive bounds.
    Integer { min: i64, max: i64 },
    /// Free number with a step for +/- and a display precision.
    Float { step: f64, decimals: usize },
}

impl InputField {
    pub fn label(&self) -> &'static str {
        match self {
            InputField::GridPosition => "Grid Position",
            InputField::LapTime => "Best Lap Time (s)",
            InputField::BestQuali => "Best Quali Time (s)",
            InputField::RacePace => "Race Pace (s)",
            InputField::Sector1Time => "Sector 1 Time (s)",
            InputField::Sector2Time => "Sector 2 Time (s)",
            InputField::Sector3Time => "Sector 3 Time (s)",
            InputField::DriverEncoded => "Driver ID (encoded)",
            InputField::AvgPrevPositions => "Avg Prev Positions",
            InputField::AvgPrevPoints => "Avg Prev Points",
            InputField::TimeDiffFromFastest => "Time Diff From Fastest (s)",
        }
    }

    pub fn field_type(&self) -> FieldType {
        match self {
            InputField::GridPosition => FieldType::Integer {
                min: GRID_POSITIONS.0,
                max: GRID_POSITIONS.1,
            },
            InputField::DriverEncoded => FieldType::Integer {
                min: DRIVER_CODES.0,
                max: DRIVER_CODES.1,
            },
            InputField::LapTime
            | InputField::BestQuali
            | InputField::RacePace
            | InputField::Sector1Time
            | InputField::Sector2Time
            | InputField::Sector3Time => FieldType::Float { step: 0.001, decimals: 3 },
            InputField::AvgPrevPositions
            | InputField::AvgPrevPoints
            | InputField::TimeDiffFromFastest => FieldType::Float { step: 0.1, decimals: 1 },
        }
    }

    fn read(&self, raw: &RawInputs) -> f64 {
        match self {
            InputField::GridPosition => raw.grid_position as f64,
            InputField::LapTime => raw.lap_time,
            InputField::BestQuali => raw.best_quali,
            InputField::RacePace => raw.race_pace,
            InputField::Sector1Time => raw.sector1_time,
            InputField::Sector2Time => raw.sector2_time,
            InputField::Sector3Time => raw.sector3_time,
            InputField::DriverEncoded => raw.driver_encoded as f64,
            InputField::AvgPrevPositions => raw.avg_prev_positions,
            InputField::AvgPrevPoints => raw.avg_prev_points,
            InputField::TimeDiffFromFastest => raw.time_diff_from_fastest,
        }
    }

    fn write(&self, raw: &mut RawInputs, value: f64) {
        match self {
            InputField::GridPosition => raw.grid_position = value.round() as i64,
            InputField::LapTime => raw.lap_time = value,
            InputField::BestQuali => raw.best_quali = value,
            InputField::RacePace => raw.race_pace = value,
            InputField::Sector1Time => raw.sector1_time = value,
            InputField::Sector2Time => raw.sector2_time = value,
            InputField::Sector3Time => raw.sector3_time = value,
            InputField::DriverEncoded => raw.driver_encoded = value.round() as i64,
            InputField::AvgPrevPositions => raw.avg_prev_positions = value,
            InputField::AvgPrevPoints => raw.avg_prev_points = value,
            InputField::TimeDiffFromFastest => raw.time_diff_from_fastest = value,
        }
    }
}

/// Live form values plus cursor and edit state. Lives in the TUI task only;
/// the controller receives copies of `inputs`.
#[derive(Debug, Clone)]
pub struct FormState {
    pub inputs: RawInputs,
    defaults: RawInputs,
    pub time_diff: TimeDiffMode,
    pub selected: usize,
    pub editing: bool,
    pub edit_buffer: String,
    pub error: Option<String>,
}

impl FormState {
    pub fn new(defaults: RawInputs, time_diff: TimeDiffMode) -> Self {
        Self {
            inputs: defaults,
            defaults,
            time_diff,
            selected: 0,
            editing: false,
            edit_buffer: String::new(),
            error: None,
        }
    }

    pub fn selected_field(&self) -> InputField {
        FIELDS[self.selected]
    }

    pub fn is_read_only(&self, field: InputField) -> bool {
        field == InputField::TimeDiffFromFastest && self.time_diff.is_auto()
    }

    /// Display string for a field, using the auto-derived value where applicable.
    pub fn display_value(&self, field: InputField) -> String {
        let value = if self.is_read_only(field) {
            self.time_diff.resolve(&self.inputs)
        } else {
            field.read(&self.inputs)
        };
        match field.field_type() {
            FieldType::Integer { .. } => format!("{}", value as i64),
            FieldType::Float { decimals, .. } => format!("{:.*}", decimals, value),
        }
    }

    pub fn select_next(&mut self) {
        if !self.editing {
            self.selected = (self.selected + 1) % FIELDS.len();
        }
    }

    pub fn select_prev(&mut self) {
        if !self.editing {
            self.selected = (self.selected + FIELDS.len() - 1) % FIELDS.len();
        }
    }

    /// Step the selected field by `direction` (+1 / -1) steps. Integer
    /// sliders stay within their bounds; floats never step below zero.
    pub fn step(&mut self, direction: i32) {
        let field = self.selected_field();
        if self.editing || self.is_read_only(field) {
            return;
        }
        let current = field.read(&self.inputs);
        let next = match field.field_type() {
            FieldType::Integer { min, max } => {
                (current as i64 + direction as i64).clamp(min, max) as f64
            }
            FieldType::Float { step, decimals } => {
                let scale = 10f64.powi(decimals as i32);
                let stepped = ((current + step * direction as f64) * scale).round() / scale;
                stepped.max(0.0)
            }
        };
        field.write(&mut self.inputs, next);
        self.error = None;
    }

    pub fn begin_edit(&mut self) {
        let field = self.selected_field();
        if self.is_read_only(field) {
            self.error = Some(format!("{} is derived automatically", field.label()));
            return;
        }
        self.editing = true;
        self.edit_buffer = self.display_value(field);
        self.error = None;
    }

    pub fn push_char(&mut self, c: char) {
        if self.editing && (c.is_ascii_digit() || c == '.' || c == '-') {
            self.edit_buffer.push(c);
        }
    }

    pub fn pop_char(&mut self) {
        if self.editing {
            self.edit_buffer.pop();
        }
    }

    pub fn cancel_edit(&mut self) {
        self.editing = false;
        self.edit_buffer.clear();
    }

    /// Parse the buffer into the selected field. Bounds are left to
    /// derivation so out-of-range values surface as input errors on submit.
    pub fn commit_edit(&mut self) -> Result<(), String> {
        let field = self.selected_field();
        let text = self.edit_buffer.trim();
        let parsed = match field.field_type() {
            FieldType::Integer { .. } => text.parse::<i64>().map(|v| v as f64).ok(),
            FieldType::Float { .. } => text.parse::<f64>().ok().filter(|v| v.is_finite()),
        };
        match parsed {
            Some(value) => {
                field.write(&mut self.inputs, value);
                self.cancel_edit();
                self.error = None;
                Ok(())
            }
            None => {
                let msg = format!("{:?} is not a valid value for {}", text, field.label());
                self.error = Some(msg.clone());
                Err(msg)
            }
        }
    }

    pub fn reset(&mut self) {
        self.inputs = self.defaults;
        self.cancel_edit();
        self.error = None;
    }

    /// Snapshot sent to the controller on submit.
    pub fn snapshot(&self) -> RawInputs {
        self.inputs
    }
}
