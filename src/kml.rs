//! Very simple functions for producing KML files specifically suited to this crate and the programs
//! that use it.
//!
//! This is not a general solution at all. Only the handful of elements needed to put users and
//! heat zones on a map are implemented, with a streaming API. That means the user is responsible
//! for closing all tags.

use crate::{error::HeatZoneResult, geo::Coord};
use chrono::{DateTime, Utc};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

pub struct KmlFile(BufWriter<File>);

impl KmlFile {
    pub fn new<P: AsRef<Path>>(pth: P) -> HeatZoneResult<Self> {
        let p = pth.as_ref();

        let f = std::fs::File::create(p)?;
        let mut new = KmlFile(BufWriter::new(f));
        new.start_document()?;
        Ok(new)
    }
}

impl KmlWriter for KmlFile {
    fn output(&mut self) -> &mut dyn Write {
        &mut self.0
    }
}

impl Drop for KmlFile {
    fn drop(&mut self) {
        self.finish_document();
        let _ = self.0.flush();
    }
}

/// Write KML into memory, the caller is responsible for starting and finishing the document.
impl KmlWriter for Vec<u8> {
    fn output(&mut self) -> &mut dyn Write {
        self
    }
}

/// Escape the characters that are not allowed in XML text.
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

pub trait KmlWriter {
    fn output(&mut self) -> &mut dyn Write;

    /// Put the header out.
    fn start_document(&mut self) -> HeatZoneResult<()> {
        const HEADER: &str = concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            "\n",
            r#"<kml xmlns="http://www.opengis.net/kml/2.2">"#,
            "\n",
            "<Document>\n"
        );

        self.output().write_all(HEADER.as_bytes())?;

        Ok(())
    }

    /// Close a document.
    fn finish_document(&mut self) {
        const FOOTER: &str = concat!(r#"</Document>"#, "\n", r#"</kml>"#, "\n");
        let _ = self.output().write_all(FOOTER.as_bytes());
    }

    /// Write a description element to the file.
    fn write_description(&mut self, description: &str) -> HeatZoneResult<()> {
        writeln!(
            self.output(),
            "<description><![CDATA[{}]]></description>",
            description
        )?;
        Ok(())
    }

    /// Write a name element, escaping the text.
    fn write_name(&mut self, name: &str) -> HeatZoneResult<()> {
        writeln!(self.output(), "<name>{}</name>", escape(name))?;
        Ok(())
    }

    /// Start a KML folder.
    fn start_folder(
        &mut self,
        name: Option<&str>,
        description: Option<&str>,
        is_open: bool,
    ) -> HeatZoneResult<()> {
        self.output().write_all("<Folder>\n".as_bytes())?;

        if let Some(name) = name {
            self.write_name(name)?;
        }

        if let Some(description) = description {
            self.write_description(description)?;
        }

        if is_open {
            self.output().write_all("<open>1</open>\n".as_bytes())?;
        }

        Ok(())
    }

    /// Close out a folder element
    fn finish_folder(&mut self) -> HeatZoneResult<()> {
        writeln!(self.output(), "</Folder>")?;
        Ok(())
    }

    /// Start a placemark element.
    fn start_placemark(
        &mut self,
        name: Option<&str>,
        description: Option<&str>,
        style_url: Option<&str>,
    ) -> HeatZoneResult<()> {
        writeln!(self.output(), "<Placemark>")?;

        if let Some(name) = name {
            self.write_name(name)?;
        }

        if let Some(description) = description {
            self.write_description(description)?;
        }

        if let Some(style_url) = style_url {
            writeln!(self.output(), "<styleUrl>{}</styleUrl>", style_url)?;
        }

        Ok(())
    }

    /// Close out a placemark element.
    fn finish_placemark(&mut self) -> HeatZoneResult<()> {
        writeln!(self.output(), "</Placemark>")?;
        Ok(())
    }

    /// Start a style definition.
    fn start_style(&mut self, style_id: Option<&str>) -> HeatZoneResult<()> {
        if let Some(style_id) = style_id {
            writeln!(self.output(), "<Style id=\"{}\">", style_id)?;
        } else {
            writeln!(self.output(), "<Style>")?;
        }
        Ok(())
    }

    /// Close out a style definition.
    fn finish_style(&mut self) -> HeatZoneResult<()> {
        writeln!(self.output(), "</Style>")?;
        Ok(())
    }

    /// Create a PolyStyle element.
    ///
    /// These should ONLY go inside a style element. Colors are in the KML aabbggrr format.
    fn create_poly_style(
        &mut self,
        color: Option<&str>,
        filled: bool,
        outlined: bool,
    ) -> HeatZoneResult<()> {
        writeln!(self.output(), "<PolyStyle>")?;

        if let Some(color) = color {
            writeln!(self.output(), "<color>{}</color>", color)?;
            writeln!(self.output(), "<colorMode>normal</colorMode>")?;
        } else {
            writeln!(self.output(), "<colorMode>random</colorMode>")?;
        }

        let filled = if filled { 1 } else { 0 };
        let outlined = if outlined { 1 } else { 0 };

        writeln!(self.output(), "<fill>{}</fill>", filled)?;
        writeln!(self.output(), "<outline>{}</outline>", outlined)?;

        writeln!(self.output(), "</PolyStyle>")?;
        Ok(())
    }

    /// Create an IconStyle element.
    fn create_icon_style(&mut self, icon_url: Option<&str>, scale: f64) -> HeatZoneResult<()> {
        writeln!(self.output(), "<IconStyle>")?;

        if scale > 0.0 {
            writeln!(self.output(), "<scale>{}</scale>", scale)?;
        } else {
            writeln!(self.output(), "<scale>1</scale>")?;
        }

        if let Some(icon_url) = icon_url {
            writeln!(self.output(), "<Icon><href>{}</href></Icon>", icon_url)?;
        }

        writeln!(self.output(), "</IconStyle>")?;
        Ok(())
    }

    /// Write out a TimeStamp element.
    fn timestamp(&mut self, when: DateTime<Utc>) -> HeatZoneResult<()> {
        writeln!(
            self.output(),
            "<TimeStamp><when>{}</when></TimeStamp>",
            when.format("%Y-%m-%dT%H:%M:%S.000Z")
        )?;
        Ok(())
    }

    /// Write out a KML Point element
    fn create_point(&mut self, lat: f64, lon: f64, z: f64) -> HeatZoneResult<()> {
        writeln!(
            self.output(),
            "<Point>\n<coordinates>{},{},{}</coordinates>\n</Point>",
            lon,
            lat,
            z
        )?;
        Ok(())
    }

    /// Write out a Polygon approximating a circle of `radius` meters around `center`.
    ///
    /// Should be used inside a Placemark element.
    fn create_circle(&mut self, center: Coord, radius: f64, vertices: usize) -> HeatZoneResult<()> {
        let vertices = vertices.max(3);

        writeln!(self.output(), "<Polygon>")?;
        writeln!(self.output(), "<tessellate>1</tessellate>")?;
        writeln!(self.output(), "<outerBoundaryIs>\n<LinearRing>\n<coordinates>")?;

        // The ring is closed by repeating the first vertex.
        for i in 0..=vertices {
            let bearing = 360.0 * (i % vertices) as f64 / vertices as f64;
            let Coord { lat, lon } = center.destination(bearing, radius);
            writeln!(self.output(), "{},{},0", lon, lat)?;
        }

        writeln!(self.output(), "</coordinates>\n</LinearRing>\n</outerBoundaryIs>")?;
        writeln!(self.output(), "</Polygon>")?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(escape("plain"), "plain");
        assert_eq!(escape("<a & b>"), "&lt;a &amp; b&gt;");
    }

    #[test]
    fn test_circle_is_closed() {
        let mut buf: Vec<u8> = vec![];
        buf.create_circle(Coord::new(45.0, -110.0), 300.0, 8).unwrap();

        let text = String::from_utf8(buf).unwrap();
        let coords: Vec<&str> = text
            .lines()
            .filter(|line| line.ends_with(",0"))
            .collect();

        assert_eq!(coords.len(), 9);
        assert_eq!(coords[0], coords[8]);
    }

    #[test]
    fn test_placemark_name_escaped() {
        let mut buf: Vec<u8> = vec![];
        buf.start_placemark(Some("a<b"), None, Some("#near")).unwrap();
        buf.finish_placemark().unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("<name>a&lt;b</name>"));
        assert!(text.contains("<styleUrl>#near</styleUrl>"));
    }
}
