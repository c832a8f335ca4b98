use indexmap::IndexMap;

/// One provider style element selected by a style, with its default weight
/// and the largest weight the element accepts.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleElementSpec {
    pub ak_uuid: String,
    pub weight: f64,
    pub max_weight: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StyleSpec {
    pub key: String,
    pub label: String,
    pub prompt_suffix: String,
    pub init_strength: f64,
    pub elements: Vec<StyleElementSpec>,
}

#[derive(Debug, Clone)]
pub struct StyleRegistry {
    styles: IndexMap<String, StyleSpec>,
}

impl StyleRegistry {
    pub fn new(styles: Option<IndexMap<String, StyleSpec>>) -> Self {
        Self {
            styles: styles.unwrap_or_else(default_styles),
        }
    }

    pub fn get(&self, key: &str) -> Option<&StyleSpec> {
        self.styles.get(key)
    }

    pub fn list(&self) -> impl Iterator<Item = &StyleSpec> {
        self.styles.values()
    }

    pub fn keys(&self) -> Vec<String> {
        self.styles.keys().cloned().collect()
    }
}

impl Default for StyleRegistry {
    fn default() -> Self {
        Self::new(None)
    }
}

fn default_styles() -> IndexMap<String, StyleSpec> {
    let mut map = IndexMap::new();

    let mut insert = |key: &str,
                      label: &str,
                      prompt_suffix: &str,
                      init_strength: f64,
                      elements: &[(&str, f64, f64)]| {
        map.insert(
            key.to_string(),
            StyleSpec {
                key: key.to_string(),
                label: label.to_string(),
                prompt_suffix: prompt_suffix.to_string(),
                init_strength,
                elements: elements
                    .iter()
                    .map(|(ak_uuid, weight, max_weight)| StyleElementSpec {
                        ak_uuid: (*ak_uuid).to_string(),
                        weight: *weight,
                        max_weight: *max_weight,
                    })
                    .collect(),
            },
        );
    };

    insert(
        "watercolor",
        "Watercolor 水彩",
        "delicate watercolor painting, soft washes of color, textured paper grain, gentle light",
        0.45,
        &[("1fcd2e1a-7f38-49f1-9e1c-64a7b9c3d201", 0.6, 1.0)],
    );
    insert(
        "oil-portrait",
        "Oil Portrait 油画肖像",
        "classical oil painting portrait, rich impasto brushwork, warm studio lighting, dark backdrop",
        0.5,
        &[("8a42c7b3-0d96-4f2e-b1aa-3c5de08f7a12", 0.7, 1.0)],
    );
    insert(
        "ink-wash",
        "Ink Wash 水墨国风",
        "traditional Chinese ink wash painting, flowing brush strokes, misty negative space, seal stamp accents",
        0.4,
        &[
            ("c9157d40-62bb-4e3f-8d04-efa61b20c933", 0.8, 1.0),
            ("3e8f02ad-5c71-48d9-a2e6-907b14d5fb68", 0.3, 0.8),
        ],
    );
    insert(
        "cyberpunk",
        "Cyberpunk 赛博朋克",
        "cyberpunk neon portrait, glowing magenta and cyan rim light, rain-slick city bokeh, holographic accents",
        0.55,
        &[("d60b91f5-24a8-4c07-93be-1f7c8ea04d56", 0.65, 1.0)],
    );
    insert(
        "plush",
        "Plush Toy 毛绒玩具",
        "adorable plush toy rendition, soft felt texture, oversized glossy eyes, pastel studio backdrop",
        0.6,
        &[("74acf1e9-880d-4b26-ae53-62c09d13ba84", 0.75, 1.0)],
    );

    map
}
