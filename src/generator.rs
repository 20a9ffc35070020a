//! Seeded generator of structured test documents.
//!
//! Shape is controlled by the builder: flat field count, nesting, planted
//! target fields, array fields, or a target byte size. For a fixed
//! configuration and seed the output is byte-identical across runs, which
//! is what makes benchmark runs comparable.

use crate::document::{set_value_at_path, JsonDocument, JsonMap, JsonValue};
use crate::error::{BenchError, BenchResult};
use crate::random::SeededRng;

/// Element kind for generated array fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArrayElementKind {
    String,
    Number,
    #[default]
    Object,
    Mixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocumentTemplate {
    EcommerceOrder,
    UserProfile,
    IotSensor,
}

/// Fixed epoch used for generated timestamps so template documents stay
/// deterministic under a fixed seed.
const TIMESTAMP_BASE_SECS: i64 = 1_700_000_000;

const SECONDS_PER_YEAR: i64 = 86_400 * 365;

pub struct DocumentGenerator {
    rng: SeededRng,
    field_count: usize,
    min_string_length: usize,
    max_string_length: usize,
    numeric_field_probability: f64,
    boolean_field_probability: f64,
    nesting_depth: usize,
    fields_per_level: usize,
    target_path: Option<String>,
    target_value: Option<JsonValue>,
    array_field_count: usize,
    min_array_size: usize,
    max_array_size: usize,
    array_element_kind: ArrayElementKind,
    target_size_bytes: usize,
    size_tolerance_percent: usize,
    target_field_position: usize,
    target_field_name: Option<String>,
    template: Option<DocumentTemplate>,
}

impl DocumentGenerator {
    pub fn builder() -> DocumentGeneratorBuilder {
        DocumentGeneratorBuilder::default()
    }

    /// Preset for e-commerce order documents.
    pub fn ecommerce_order() -> DocumentGeneratorBuilder {
        let mut b = Self::builder();
        b.template = Some(DocumentTemplate::EcommerceOrder);
        b
    }

    /// Preset for user profile documents.
    pub fn user_profile() -> DocumentGeneratorBuilder {
        let mut b = Self::builder();
        b.template = Some(DocumentTemplate::UserProfile);
        b
    }

    /// Preset for IoT sensor reading documents.
    pub fn iot_sensor_reading() -> DocumentGeneratorBuilder {
        let mut b = Self::builder();
        b.template = Some(DocumentTemplate::IotSensor);
        b
    }

    /// Generates one document with the given id.
    pub fn generate(&mut self, id: &str) -> JsonDocument {
        if let Some(template) = self.template {
            return self.generate_from_template(template, id);
        }
        if self.target_size_bytes > 0 {
            return self.generate_to_size(id);
        }
        self.generate_standard(id)
    }

    /// Generates `count` documents with ids `{prefix}-0` .. `{prefix}-{count-1}`.
    pub fn generate_batch(&mut self, prefix: &str, count: usize) -> Vec<JsonDocument> {
        (0..count)
            .map(|i| self.generate(&format!("{prefix}-{i}")))
            .collect()
    }

    fn generate_standard(&mut self, id: &str) -> JsonDocument {
        let mut content = JsonMap::new();

        let regular_fields = self.field_count.saturating_sub(self.array_field_count);
        let mut field_index = 0usize;

        for i in 0..regular_fields {
            match (&self.target_field_name, self.target_field_position) {
                (Some(name), pos) if pos == i + 1 => {
                    let value = self
                        .target_value
                        .clone()
                        .unwrap_or_else(|| JsonValue::Str("TARGET_VALUE".to_string()));
                    content.insert(name.clone(), value);
                }
                _ => {
                    content.insert(format!("field_{field_index:03}"), self.field_value());
                    field_index += 1;
                }
            }
        }

        if self.nesting_depth > 0 {
            let nested = self.nested_object(1);
            content.insert("nested".to_string(), JsonValue::Object(nested));
        }

        for i in 0..self.array_field_count {
            let name = if i == 0 {
                "items".to_string()
            } else {
                format!("array_{i}")
            };
            let array = self.array_value();
            content.insert(name, array);
        }

        if let Some(path) = self.target_path.clone() {
            if !path.is_empty() {
                let value = self.target_value.clone().unwrap_or(JsonValue::Null);
                set_value_at_path(&mut content, &path, value);
            }
        }

        JsonDocument::builder(id).fields(content).build()
    }

    fn generate_to_size(&mut self, id: &str) -> JsonDocument {
        let mut content = JsonMap::new();
        let tolerance = self.target_size_bytes * self.size_tolerance_percent / 100;
        let min_size = self.target_size_bytes.saturating_sub(tolerance);
        let mut field_index = 0usize;

        let mut current_size = 4;
        while current_size < min_size {
            let name = format!("field_{field_index:03}");
            let value = self.field_value();
            current_size += name.len() * 2 + 4 + value.estimated_size_bytes();
            content.insert(name, value);
            field_index += 1;
        }

        JsonDocument::builder(id).fields(content).build()
    }

    fn generate_from_template(&mut self, template: DocumentTemplate, id: &str) -> JsonDocument {
        match template {
            DocumentTemplate::EcommerceOrder => self.generate_ecommerce_order(id),
            DocumentTemplate::UserProfile => self.generate_user_profile(id),
            DocumentTemplate::IotSensor => self.generate_iot_sensor(id),
        }
    }

    fn generate_ecommerce_order(&mut self, id: &str) -> JsonDocument {
        let mut content = JsonMap::new();

        content.insert("orderNumber".into(), JsonValue::Str(format!("ORD-{id}")));
        let order_secs = TIMESTAMP_BASE_SECS + self.long_between(0, SECONDS_PER_YEAR);
        content.insert("orderDate".into(), JsonValue::Str(iso_timestamp(order_secs)));
        content.insert(
            "status".into(),
            self.choice(&["PENDING", "CONFIRMED", "SHIPPED", "DELIVERED"]),
        );

        let mut customer = JsonMap::new();
        customer.insert(
            "customerId".into(),
            JsonValue::Str(format!("CUST-{}", self.rng.next_string(8))),
        );
        customer.insert("name".into(), JsonValue::Str(self.random_name()));
        customer.insert("email".into(), JsonValue::Str(self.random_email()));
        customer.insert(
            "tier".into(),
            self.choice(&["BRONZE", "SILVER", "GOLD", "PLATINUM"]),
        );
        content.insert("customer".into(), JsonValue::Object(customer));

        let shipping = self.random_address();
        content.insert("shippingAddress".into(), JsonValue::Object(shipping));
        let billing = self.random_address();
        content.insert("billingAddress".into(), JsonValue::Object(billing));

        let item_count = self.int_between(3, 14);
        let mut line_items = Vec::with_capacity(item_count as usize);
        let mut subtotal = 0.0f64;
        for i in 0..item_count {
            let price = 5.0 + self.rng.next_double() * 200.0;
            let qty = self.int_between(1, 4) as i64;
            subtotal += price * qty as f64;
            let mut item = JsonMap::new();
            item.insert("lineNumber".into(), JsonValue::Int(i as i64 + 1));
            item.insert(
                "sku".into(),
                JsonValue::Str(format!("SKU-{}", self.rng.next_string(6))),
            );
            item.insert(
                "productName".into(),
                JsonValue::Str(format!("Product {}", self.rng.next_string(10))),
            );
            item.insert("unitPrice".into(), JsonValue::Float(round_cents(price)));
            item.insert("quantity".into(), JsonValue::Int(qty));
            item.insert(
                "subtotal".into(),
                JsonValue::Float(round_cents(price * qty as f64)),
            );
            line_items.push(JsonValue::Object(item));
        }
        content.insert("lineItems".into(), JsonValue::Array(line_items));

        content.insert("subtotal".into(), JsonValue::Float(round_cents(subtotal)));
        content.insert(
            "taxTotal".into(),
            JsonValue::Float(round_cents(subtotal * 0.08)),
        );
        content.insert("shippingCost".into(), JsonValue::Float(9.99));
        content.insert(
            "grandTotal".into(),
            JsonValue::Float(round_cents(subtotal * 1.08 + 9.99)),
        );

        JsonDocument::builder(id).fields(content).build()
    }

    fn generate_user_profile(&mut self, id: &str) -> JsonDocument {
        let mut content = JsonMap::new();

        content.insert(
            "username".into(),
            JsonValue::Str(format!("user_{}", self.rng.next_string(8))),
        );
        content.insert("email".into(), JsonValue::Str(self.random_email()));
        content.insert(
            "passwordHash".into(),
            JsonValue::Str(self.rng.next_string(64)),
        );
        let created_secs = TIMESTAMP_BASE_SECS - self.long_between(0, SECONDS_PER_YEAR);
        content.insert(
            "createdAt".into(),
            JsonValue::Str(iso_timestamp(created_secs)),
        );

        let mut profile = JsonMap::new();
        let first = self.random_name();
        let last = self.random_name();
        profile.insert(
            "firstName".into(),
            JsonValue::Str(first.split(' ').next().unwrap_or("").to_string()),
        );
        profile.insert(
            "lastName".into(),
            JsonValue::Str(last.split(' ').nth(1).unwrap_or("").to_string()),
        );
        profile.insert("bio".into(), JsonValue::Str(self.rng.next_string(100)));
        profile.insert(
            "avatarUrl".into(),
            JsonValue::Str(format!(
                "https://example.com/avatars/{}.jpg",
                self.rng.next_string(10)
            )),
        );
        profile.insert(
            "location".into(),
            self.choice(&["New York", "London", "Tokyo", "Sydney", "Berlin"]),
        );
        content.insert("profile".into(), JsonValue::Object(profile));

        let mut preferences = JsonMap::new();
        preferences.insert("theme".into(), self.choice(&["light", "dark", "auto"]));
        preferences.insert(
            "language".into(),
            self.choice(&["en", "es", "fr", "de", "ja"]),
        );
        preferences.insert("notifications".into(), JsonValue::Bool(self.rng.next_bool()));
        content.insert("preferences".into(), JsonValue::Object(preferences));

        let mut stats = JsonMap::new();
        stats.insert(
            "loginCount".into(),
            JsonValue::Int(self.int_between(1, 999) as i64),
        );
        stats.insert(
            "postsCount".into(),
            JsonValue::Int(self.int_between(0, 499) as i64),
        );
        stats.insert(
            "followersCount".into(),
            JsonValue::Int(self.int_between(0, 9999) as i64),
        );
        content.insert("stats".into(), JsonValue::Object(stats));

        JsonDocument::builder(id).fields(content).build()
    }

    fn generate_iot_sensor(&mut self, id: &str) -> JsonDocument {
        let mut content = JsonMap::new();

        content.insert(
            "sensorId".into(),
            JsonValue::Str(format!("SENSOR-{}", self.rng.next_string(8))),
        );
        content.insert(
            "deviceType".into(),
            self.choice(&["temperature", "humidity", "pressure", "motion"]),
        );
        let reading_secs = TIMESTAMP_BASE_SECS + self.long_between(0, SECONDS_PER_YEAR);
        content.insert(
            "timestamp".into(),
            JsonValue::Str(iso_timestamp(reading_secs)),
        );

        let mut location = JsonMap::new();
        location.insert(
            "building".into(),
            JsonValue::Str(format!("Building-{}", self.int_between(1, 9))),
        );
        location.insert("floor".into(), JsonValue::Int(self.int_between(1, 19) as i64));
        location.insert(
            "room".into(),
            JsonValue::Int(self.int_between(100, 998) as i64),
        );
        content.insert("location".into(), JsonValue::Object(location));

        let reading_count = self.int_between(10, 49);
        let mut readings = Vec::with_capacity(reading_count as usize);
        for i in 0..reading_count {
            let mut reading = JsonMap::new();
            reading.insert(
                "timestamp".into(),
                JsonValue::Str(iso_timestamp(reading_secs - i as i64 * 60)),
            );
            reading.insert(
                "value".into(),
                JsonValue::Float(round_cents(self.rng.next_double() * 100.0)),
            );
            reading.insert("unit".into(), self.choice(&["C", "F", "%", "hPa"]));
            reading.insert("quality".into(), self.choice(&["good", "fair", "poor"]));
            readings.push(JsonValue::Object(reading));
        }
        content.insert("readings".into(), JsonValue::Array(readings));

        content.insert(
            "battery".into(),
            JsonValue::Int(self.int_between(0, 99) as i64),
        );
        content.insert(
            "signalStrength".into(),
            JsonValue::Int(self.int_between(-100, -31) as i64),
        );

        JsonDocument::builder(id).fields(content).build()
    }

    fn field_value(&mut self) -> JsonValue {
        let roll = self.rng.next_double();

        if roll < self.numeric_field_probability {
            return if self.rng.next_bool() {
                JsonValue::Int(self.int_between(0, 999_999) as i64)
            } else {
                JsonValue::Float(round_cents(self.rng.next_double() * 10_000.0))
            };
        }

        if roll < self.numeric_field_probability + self.boolean_field_probability {
            return JsonValue::Bool(self.rng.next_bool());
        }

        let length = self.int_between(self.min_string_length as i32, self.max_string_length as i32);
        JsonValue::Str(self.rng.next_string(length as usize))
    }

    fn nested_object(&mut self, current_depth: usize) -> JsonMap {
        let mut nested = JsonMap::new();
        for i in 0..self.fields_per_level {
            nested.insert(format!("field_{i}"), self.field_value());
        }
        if current_depth < self.nesting_depth {
            let child = self.nested_object(current_depth + 1);
            nested.insert("nested".to_string(), JsonValue::Object(child));
        }
        nested
    }

    fn array_value(&mut self) -> JsonValue {
        let size = self.int_between(self.min_array_size as i32, self.max_array_size as i32);
        let mut array = Vec::with_capacity(size as usize);
        for index in 0..size {
            array.push(self.array_element(index as usize));
        }
        JsonValue::Array(array)
    }

    fn array_element(&mut self, index: usize) -> JsonValue {
        match self.array_element_kind {
            ArrayElementKind::String => JsonValue::Str(self.rng.next_string(20)),
            ArrayElementKind::Number => JsonValue::Float(self.rng.next_double() * 1000.0),
            ArrayElementKind::Object => {
                let mut obj = JsonMap::new();
                obj.insert("index".into(), JsonValue::Int(index as i64));
                obj.insert(
                    "sku".into(),
                    JsonValue::Str(format!("SKU-{}", self.rng.next_string(6))),
                );
                obj.insert(
                    "name".into(),
                    JsonValue::Str(format!("Item {}", self.rng.next_string(10))),
                );
                obj.insert(
                    "value".into(),
                    JsonValue::Float(round_cents(self.rng.next_double() * 100.0)),
                );
                JsonValue::Object(obj)
            }
            ArrayElementKind::Mixed => {
                if self.rng.next_bool() {
                    JsonValue::Str(self.rng.next_string(15))
                } else {
                    JsonValue::Float(self.rng.next_double() * 100.0)
                }
            }
        }
    }

    fn choice(&mut self, options: &[&str]) -> JsonValue {
        let idx = self.int_between(0, options.len() as i32 - 1) as usize;
        JsonValue::Str(options[idx].to_string())
    }

    fn random_name(&mut self) -> String {
        const FIRST: [&str; 8] = [
            "John", "Jane", "Bob", "Alice", "Charlie", "Diana", "Edward", "Fiona",
        ];
        const LAST: [&str; 8] = [
            "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis",
        ];
        let first = FIRST[self.int_between(0, FIRST.len() as i32 - 1) as usize];
        let last = LAST[self.int_between(0, LAST.len() as i32 - 1) as usize];
        format!("{first} {last}")
    }

    fn random_email(&mut self) -> String {
        let local = self.rng.next_string(8).to_lowercase();
        let domain = ["gmail.com", "yahoo.com", "outlook.com", "example.com"]
            [self.int_between(0, 3) as usize];
        format!("{local}@{domain}")
    }

    fn random_address(&mut self) -> JsonMap {
        let mut address = JsonMap::new();
        let street_name = ["Main", "Oak", "Maple", "First"][self.int_between(0, 3) as usize];
        let street_kind = ["St", "Ave", "Blvd", "Dr"][self.int_between(0, 3) as usize];
        address.insert(
            "street".into(),
            JsonValue::Str(format!(
                "{} {street_name} {street_kind}",
                self.int_between(1, 9998)
            )),
        );
        address.insert(
            "city".into(),
            self.choice(&["New York", "Los Angeles", "Chicago", "Houston", "Phoenix"]),
        );
        address.insert("state".into(), self.choice(&["NY", "CA", "IL", "TX", "AZ"]));
        address.insert(
            "zip".into(),
            JsonValue::Str(format!("{:05}", self.int_between(10_000, 99_998))),
        );
        address.insert("country".into(), JsonValue::Str("USA".into()));
        address
    }

    /// Uniform integer in `[min, max]`. Ranges were validated at build.
    fn int_between(&mut self, min: i32, max: i32) -> i32 {
        if min >= max {
            return min;
        }
        self.rng.next_range(min, max + 1).expect("validated range")
    }

    fn long_between(&mut self, min: i64, bound: i64) -> i64 {
        if bound <= min {
            return min;
        }
        min + self
            .rng
            .next_long_bounded(bound - min)
            .expect("validated range")
    }
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// ISO-8601 UTC timestamp from epoch seconds, without a calendar crate.
fn iso_timestamp(epoch_secs: i64) -> String {
    let days = epoch_secs.div_euclid(86_400);
    let secs_of_day = epoch_secs.rem_euclid(86_400);

    // Civil-from-days (Hinnant's algorithm).
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = if m <= 2 { y + 1 } else { y };

    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        year,
        m,
        d,
        secs_of_day / 3600,
        (secs_of_day % 3600) / 60,
        secs_of_day % 60
    )
}

/// Builder for [`DocumentGenerator`]; validation runs once at `build`.
pub struct DocumentGeneratorBuilder {
    random_source: Option<SeededRng>,
    field_count: usize,
    min_string_length: usize,
    max_string_length: usize,
    numeric_field_probability: f64,
    boolean_field_probability: f64,
    nesting_depth: usize,
    fields_per_level: usize,
    target_path: Option<String>,
    target_value: Option<JsonValue>,
    array_field_count: usize,
    min_array_size: usize,
    max_array_size: usize,
    array_element_kind: ArrayElementKind,
    target_size_bytes: usize,
    size_tolerance_percent: usize,
    target_field_position: usize,
    target_field_name: Option<String>,
    template: Option<DocumentTemplate>,
}

impl Default for DocumentGeneratorBuilder {
    fn default() -> Self {
        Self {
            random_source: None,
            field_count: 10,
            min_string_length: 10,
            max_string_length: 50,
            numeric_field_probability: 0.2,
            boolean_field_probability: 0.1,
            nesting_depth: 0,
            fields_per_level: 5,
            target_path: None,
            target_value: None,
            array_field_count: 0,
            min_array_size: 5,
            max_array_size: 10,
            array_element_kind: ArrayElementKind::default(),
            target_size_bytes: 0,
            size_tolerance_percent: 20,
            target_field_position: 0,
            target_field_name: None,
            template: None,
        }
    }
}

impl DocumentGeneratorBuilder {
    pub fn random_source(mut self, rng: SeededRng) -> Self {
        self.random_source = Some(rng);
        self
    }

    pub fn seed(self, seed: u64) -> Self {
        self.random_source(SeededRng::new(seed))
    }

    pub fn field_count(mut self, count: usize) -> Self {
        self.field_count = count;
        self
    }

    pub fn string_field_length(mut self, min: usize, max: usize) -> Self {
        self.min_string_length = min;
        self.max_string_length = max;
        self
    }

    pub fn numeric_field_probability(mut self, probability: f64) -> Self {
        self.numeric_field_probability = probability;
        self
    }

    pub fn boolean_field_probability(mut self, probability: f64) -> Self {
        self.boolean_field_probability = probability;
        self
    }

    pub fn nesting_depth(mut self, depth: usize) -> Self {
        self.nesting_depth = depth;
        self
    }

    pub fn fields_per_level(mut self, count: usize) -> Self {
        self.fields_per_level = count;
        self
    }

    pub fn target_path(mut self, path: impl Into<String>) -> Self {
        self.target_path = Some(path.into());
        self
    }

    pub fn target_value(mut self, value: impl Into<JsonValue>) -> Self {
        self.target_value = Some(value.into());
        self
    }

    pub fn array_field_count(mut self, count: usize) -> Self {
        self.array_field_count = count;
        self
    }

    pub fn array_size(mut self, min: usize, max: usize) -> Self {
        self.min_array_size = min;
        self.max_array_size = max;
        self
    }

    pub fn array_element_kind(mut self, kind: ArrayElementKind) -> Self {
        self.array_element_kind = kind;
        self
    }

    pub fn target_size_bytes(mut self, size: usize) -> Self {
        self.target_size_bytes = size;
        self
    }

    pub fn size_tolerance_percent(mut self, percent: usize) -> Self {
        self.size_tolerance_percent = percent;
        self
    }

    /// One-based ordinal at which the target field replaces a regular
    /// field. Zero disables planting by position.
    pub fn target_field_position(mut self, position: usize) -> Self {
        self.target_field_position = position;
        self
    }

    pub fn target_field_name(mut self, name: impl Into<String>) -> Self {
        self.target_field_name = Some(name.into());
        self
    }

    pub fn build(self) -> BenchResult<DocumentGenerator> {
        if self.min_string_length > self.max_string_length {
            return Err(BenchError::config(format!(
                "min string length {} exceeds max {}",
                self.min_string_length, self.max_string_length
            )));
        }
        if self.min_array_size > self.max_array_size {
            return Err(BenchError::config(format!(
                "min array size {} exceeds max {}",
                self.min_array_size, self.max_array_size
            )));
        }
        for (name, p) in [
            ("numericFieldProbability", self.numeric_field_probability),
            ("booleanFieldProbability", self.boolean_field_probability),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(BenchError::config(format!(
                    "{name} must be in [0, 1]: {p}"
                )));
            }
        }
        if self.array_field_count > self.field_count && self.target_size_bytes == 0 {
            return Err(BenchError::config(format!(
                "arrayFieldCount {} exceeds fieldCount {}",
                self.array_field_count, self.field_count
            )));
        }

        Ok(DocumentGenerator {
            rng: self.random_source.unwrap_or_else(SeededRng::from_entropy),
            field_count: self.field_count,
            min_string_length: self.min_string_length,
            max_string_length: self.max_string_length,
            numeric_field_probability: self.numeric_field_probability,
            boolean_field_probability: self.boolean_field_probability,
            nesting_depth: self.nesting_depth,
            fields_per_level: self.fields_per_level,
            target_path: self.target_path,
            target_value: self.target_value,
            array_field_count: self.array_field_count,
            min_array_size: self.min_array_size,
            max_array_size: self.max_array_size,
            array_element_kind: self.array_element_kind,
            target_size_bytes: self.target_size_bytes,
            size_tolerance_percent: self.size_tolerance_percent,
            target_field_position: self.target_field_position,
            target_field_name: self.target_field_name,
            template: self.template,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_generation_is_reproducible() {
        let mut a = DocumentGenerator::builder()
            .seed(12345)
            .field_count(5)
            .build()
            .unwrap();
        let mut b = DocumentGenerator::builder()
            .seed(12345)
            .field_count(5)
            .build()
            .unwrap();
        assert_eq!(a.generate("doc-1"), b.generate("doc-1"));
        // And the next documents stay in lockstep.
        assert_eq!(a.generate("doc-2"), b.generate("doc-2"));
    }

    #[test]
    fn target_field_is_planted_at_position() {
        let mut generator = DocumentGenerator::builder()
            .seed(42)
            .field_count(100)
            .target_field_position(50)
            .target_field_name("target")
            .target_value("FOUND")
            .build()
            .unwrap();
        let doc = generator.generate("doc-1");

        assert_eq!(
            doc.content().get("target"),
            Some(&JsonValue::Str("FOUND".into()))
        );
        let position = doc
            .content()
            .keys()
            .filter(|k| k.as_str() != "_id")
            .position(|k| k == "target")
            .map(|i| i + 1)
            .unwrap();
        assert!((45..=55).contains(&position), "position={position}");
    }

    #[test]
    fn size_targeting_stays_within_band() {
        let target = 5000usize;
        let mut generator = DocumentGenerator::builder()
            .seed(7)
            .target_size_bytes(target)
            .size_tolerance_percent(20)
            .build()
            .unwrap();
        for i in 0..10 {
            let doc = generator.generate(&format!("doc-{i}"));
            let size = doc.estimated_size_bytes();
            assert!(
                size >= target * 80 / 100 && size <= target * 120 / 100,
                "size {size} outside band for target {target}"
            );
        }
    }

    #[test]
    fn nested_structure_has_requested_depth() {
        let mut generator = DocumentGenerator::builder()
            .seed(1)
            .field_count(5)
            .nesting_depth(4)
            .fields_per_level(3)
            .target_path("nested.nested.nested.target")
            .target_value("TARGET_VALUE")
            .build()
            .unwrap();
        let doc = generator.generate("doc-1");

        assert_eq!(
            doc.get_path("nested.nested.nested.target"),
            Some(&JsonValue::Str("TARGET_VALUE".into()))
        );
        assert!(doc.has_path("nested.nested.nested.nested.field_0"));
        assert!(!doc.has_path("nested.nested.nested.nested.nested"));
    }

    #[test]
    fn target_path_auto_creates_arrays() {
        let mut generator = DocumentGenerator::builder()
            .seed(1)
            .field_count(2)
            .target_path("orders[2].total")
            .target_value(99i64)
            .build()
            .unwrap();
        let doc = generator.generate("doc-1");
        assert_eq!(doc.get_path("orders[2].total"), Some(&JsonValue::Int(99)));
        assert!(doc.has_path("orders[0]"));
    }

    #[test]
    fn batch_ids_are_sequential() {
        let mut generator = DocumentGenerator::builder()
            .seed(9)
            .field_count(3)
            .build()
            .unwrap();
        let batch = generator.generate_batch("doc", 4);
        let ids: Vec<&str> = batch.iter().map(|d| d.id()).collect();
        assert_eq!(ids, vec!["doc-0", "doc-1", "doc-2", "doc-3"]);
        for doc in &batch {
            assert_eq!(
                doc.content().get("_id"),
                Some(&JsonValue::Str(doc.id().to_string()))
            );
        }
    }

    #[test]
    fn array_fields_are_appended() {
        let mut generator = DocumentGenerator::builder()
            .seed(11)
            .field_count(6)
            .array_field_count(2)
            .array_size(3, 3)
            .build()
            .unwrap();
        let doc = generator.generate("doc-1");
        assert_eq!(doc.content().get("items").unwrap().as_array().unwrap().len(), 3);
        assert!(doc.content().contains_key("array_1"));
        // 4 regular + 2 array fields + _id
        assert_eq!(doc.content().len(), 7);
    }

    #[test]
    fn templates_are_deterministic_per_seed() {
        let mut a = DocumentGenerator::ecommerce_order().seed(5).build().unwrap();
        let mut b = DocumentGenerator::ecommerce_order().seed(5).build().unwrap();
        let doc_a = a.generate("ord-1");
        let doc_b = b.generate("ord-1");
        assert_eq!(doc_a, doc_b);
        assert!(doc_a.has_path("customer.tier"));
        assert!(doc_a.has_path("lineItems[0].sku"));

        let mut profile = DocumentGenerator::user_profile().seed(5).build().unwrap();
        assert!(profile.generate("u-1").has_path("profile.firstName"));

        let mut sensor = DocumentGenerator::iot_sensor_reading().seed(5).build().unwrap();
        assert!(sensor.generate("s-1").has_path("location.building"));
    }

    #[test]
    fn builder_rejects_inverted_ranges() {
        assert!(DocumentGenerator::builder()
            .seed(1)
            .string_field_length(50, 10)
            .build()
            .is_err());
        assert!(DocumentGenerator::builder()
            .seed(1)
            .array_size(9, 2)
            .build()
            .is_err());
        assert!(DocumentGenerator::builder()
            .seed(1)
            .numeric_field_probability(1.5)
            .build()
            .is_err());
    }

    #[test]
    fn iso_timestamps_format_correctly() {
        assert_eq!(iso_timestamp(0), "1970-01-01T00:00:00Z");
        assert_eq!(iso_timestamp(86_400), "1970-01-02T00:00:00Z");
        assert_eq!(iso_timestamp(1_700_000_000), "2023-11-14T22:13:20Z");
    }
}
