//! Class names and display colours

use crate::io::error::{Result, invalid_parameter};

/// Labelling classes in id order with their hexadecimal display colours
pub const DEFAULT_CLASSES: [(&str, &str); 10] = [
    ("background", "#DCDCDC"),
    ("poils-cheveux", "#8B6914"),
    ("vetements", "#BF3EFF"),
    ("peau", "#FF7D40"),
    ("bois-tronc", "#E3CF57"),
    ("ciel", "#6495ED"),
    ("feuilles-vertes", "#458B00"),
    ("herbe", "#7FFF00"),
    ("eau", "#00FFFF"),
    ("roche", "#FF0000"),
];

/// Parse a `#RRGGBB` colour
///
/// # Errors
///
/// Returns an error if the string is not six hexadecimal digits with an
/// optional leading `#`
pub fn parse_hex_color(hex: &str) -> Result<[u8; 3]> {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    let invalid = || invalid_parameter("color", &hex, &"expected #RRGGBB");
    if digits.len() != 6 || !digits.is_ascii() {
        return Err(invalid());
    }

    let mut rgb = [0u8; 3];
    for (channel, value) in rgb.iter_mut().enumerate() {
        let start = channel * 2;
        let pair = digits.get(start..start + 2).ok_or_else(invalid)?;
        *value = u8::from_str_radix(pair, 16).map_err(|_parse_error| invalid())?;
    }
    Ok(rgb)
}

/// A named class and its display colour
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassEntry {
    /// Class name as used in mask directories
    pub name: String,
    /// Display colour
    pub color: [u8; 3],
}

/// Ordered class list; a class id is its position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassPalette {
    classes: Vec<ClassEntry>,
}

impl Default for ClassPalette {
    fn default() -> Self {
        Self {
            classes: DEFAULT_CLASSES
                .iter()
                .map(|&(name, hex)| ClassEntry {
                    name: name.to_string(),
                    color: parse_hex_color(hex).unwrap_or([0, 0, 0]),
                })
                .collect(),
        }
    }
}

impl ClassPalette {
    /// Build a palette from `(name, hex colour)` pairs
    ///
    /// # Errors
    ///
    /// Returns an error if a colour cannot be parsed, a name repeats, or the
    /// palette is empty or holds more classes than a `u8` label can address
    pub fn from_hex_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Result<Self> {
        let mut classes: Vec<ClassEntry> = Vec::new();
        for (name, hex) in pairs {
            if classes.iter().any(|entry| entry.name == name) {
                return Err(invalid_parameter("class", &name, &"duplicate class name"));
            }
            classes.push(ClassEntry {
                name: name.to_string(),
                color: parse_hex_color(hex)?,
            });
        }
        if classes.is_empty() || classes.len() > usize::from(u8::MAX) + 1 {
            return Err(invalid_parameter(
                "palette",
                &classes.len(),
                &"must hold between 1 and 256 classes",
            ));
        }
        Ok(Self { classes })
    }

    /// Number of classes
    pub const fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether the palette holds no class
    pub const fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Entries in id order
    pub fn entries(&self) -> &[ClassEntry] {
        &self.classes
    }

    /// Display colours in id order
    pub fn colors(&self) -> Vec<[u8; 3]> {
        self.classes.iter().map(|entry| entry.color).collect()
    }

    /// Class id of a name
    pub fn class_id(&self, name: &str) -> Option<u8> {
        self.classes
            .iter()
            .position(|entry| entry.name == name)
            .and_then(|index| u8::try_from(index).ok())
    }

    /// Name of a class id
    pub fn name(&self, class_id: u8) -> Option<&str> {
        self.classes
            .get(usize::from(class_id))
            .map(|entry| entry.name.as_str())
    }

    /// Display colour of a class id; black for unknown ids
    pub fn color(&self, class_id: u8) -> [u8; 3] {
        self.classes
            .get(usize::from(class_id))
            .map_or([0, 0, 0], |entry| entry.color)
    }
}
