//! Shared METS test fixtures

use std::sync::Arc;

use crate::config::FileGroups;
use crate::document::DocumentContext;
use crate::fetch::MemoryFetcher;
use crate::formats::FormatRegistry;
use crate::metadata::{FieldSpec, InMemoryRegistry};

/// One page, one logical node titled "Test"
pub const MINIMAL_METS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<mets:mets xmlns:mets="http://www.loc.gov/METS/" xmlns:mods="http://www.loc.gov/mods/v3" xmlns:xlink="http://www.w3.org/1999/xlink">
  <mets:dmdSec ID="DMD_1">
    <mets:mdWrap MDTYPE="MODS">
      <mets:xmlData>
        <mods:mods>
          <mods:titleInfo><mods:title>Test</mods:title></mods:titleInfo>
        </mods:mods>
      </mets:xmlData>
    </mets:mdWrap>
  </mets:dmdSec>
  <mets:structMap TYPE="LOGICAL">
    <mets:div ID="LOG_1" DMDID="DMD_1" TYPE="monograph"/>
  </mets:structMap>
  <mets:structMap TYPE="PHYSICAL">
    <mets:div ID="PHYS_0" TYPE="physSequence">
      <mets:div ID="PHYS_1" ORDER="1" TYPE="page"/>
    </mets:div>
  </mets:structMap>
  <mets:structLink>
    <mets:smLink xlink:from="LOG_1" xlink:to="PHYS_1"/>
  </mets:structLink>
</mets:mets>"#;

/// Three pages declared out of order, nested chapters, several file groups
pub const RICH_METS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<mets:mets xmlns:mets="http://www.loc.gov/METS/" xmlns:mods="http://www.loc.gov/mods/v3" xmlns:xlink="http://www.w3.org/1999/xlink" OBJID="PPN1234">
  <mets:dmdSec ID="DMD_0">
    <mets:mdWrap MDTYPE="OTHER" OTHERMDTYPE="LIDO">
      <mets:xmlData><lido xmlns="http://www.lido-schema.org"/></mets:xmlData>
    </mets:mdWrap>
  </mets:dmdSec>
  <mets:dmdSec ID="DMD_1">
    <mets:mdWrap MDTYPE="MODS">
      <mets:xmlData>
        <mods:mods>
          <mods:titleInfo>
            <mods:nonSort>Die</mods:nonSort>
            <mods:title>Chronik der Stadt</mods:title>
          </mods:titleInfo>
          <mods:name type="personal">
            <mods:displayForm>Müller, Anna</mods:displayForm>
            <mods:role><mods:roleTerm type="code">aut</mods:roleTerm></mods:role>
          </mods:name>
          <mods:originInfo>
            <mods:place><mods:placeTerm type="text">Leipzig</mods:placeTerm></mods:place>
            <mods:dateIssued keyDate="yes">1850</mods:dateIssued>
          </mods:originInfo>
          <mods:identifier type="urn">urn:nbn:de:test-1</mods:identifier>
          <mods:recordInfo><mods:recordIdentifier>REC-1</mods:recordIdentifier></mods:recordInfo>
          <mods:part><mods:detail><mods:number>12</mods:number></mods:detail></mods:part>
          <mods:classification>Geschichte</mods:classification>
        </mods:mods>
      </mets:xmlData>
    </mets:mdWrap>
  </mets:dmdSec>
  <mets:dmdSec ID="DMD_2">
    <mets:mdWrap MDTYPE="MODS">
      <mets:xmlData>
        <mods:mods>
          <mods:titleInfo><mods:title>Erstes Kapitel</mods:title></mods:titleInfo>
        </mods:mods>
      </mets:xmlData>
    </mets:mdWrap>
  </mets:dmdSec>
  <mets:fileSec>
    <mets:fileGrp USE="DEFAULT">
      <mets:file ID="IMG_1" MIMETYPE="image/jpeg"><mets:FLocat LOCTYPE="URL" xlink:href="https://img.example/1.jpg"/></mets:file>
      <mets:file ID="IMG_2" MIMETYPE="image/jpeg"><mets:FLocat LOCTYPE="URL" xlink:href="https://img.example/2.jpg"/></mets:file>
      <mets:file ID="IMG_3" MIMETYPE="image/jpeg"><mets:FLocat LOCTYPE="URL" xlink:href="https://img.example/3.jpg"/></mets:file>
    </mets:fileGrp>
    <mets:fileGrp USE="THUMBS">
      <mets:file ID="THUMB_1" MIMETYPE="image/jpeg"><mets:FLocat LOCTYPE="URL" xlink:href="https://thumb.example/1.jpg"/></mets:file>
      <mets:file ID="THUMB_2" MIMETYPE="image/jpeg"><mets:FLocat LOCTYPE="URL" xlink:href="https://thumb.example/2.jpg"/></mets:file>
      <mets:file ID="THUMB_3" MIMETYPE="image/jpeg"><mets:FLocat LOCTYPE="URL" xlink:href="https://thumb.example/3.jpg"/></mets:file>
    </mets:fileGrp>
    <mets:fileGrp USE="FULLTEXT">
      <mets:file ID="ALTO_1" MIMETYPE="text/xml"><mets:FLocat LOCTYPE="URL" xlink:href="https://ocr.example/1.xml"/></mets:file>
      <mets:file ID="ALTO_2" MIMETYPE="text/xml"><mets:FLocat LOCTYPE="URL" xlink:href="https://ocr.example/2.xml"/></mets:file>
    </mets:fileGrp>
    <mets:fileGrp USE="PRESENTATION">
      <mets:file ID="PDF_1" MIMETYPE="application/pdf" ADMID="AMD_1"><mets:FLocat LOCTYPE="URL" xlink:href="https://files.example/book.pdf"/></mets:file>
      <mets:file ID="IIP_1" MIMETYPE="application/vnd.netfpx"><mets:FLocat LOCTYPE="URL" xlink:href="https://iip.example/fcgi?FIF=1.tif"/></mets:file>
      <mets:file ID="IIP_2" MIMETYPE="application/vnd.netfpx"><mets:FLocat LOCTYPE="URL" xlink:href="https://iip.example/2.tif"/></mets:file>
      <mets:file ID="IIIF_1" MIMETYPE="application/vnd.kitodo.iiif"><mets:FLocat LOCTYPE="URL" xlink:href="https://iiif.example/iiif/2/p1/info.json"/></mets:file>
      <mets:file ID="NOURL_1" MIMETYPE="image/tiff"><mets:FLocat LOCTYPE="OTHER" xlink:href="archive:1"/></mets:file>
    </mets:fileGrp>
  </mets:fileSec>
  <mets:structMap TYPE="LOGICAL">
    <mets:div ID="LOG_0" TYPE="monograph" DMDID="DMD_0 DMD_1" ORDER="1" CONTENTIDS="urn:nbn:de:test-1">
      <mets:div ID="LOG_1" TYPE="chapter" LABEL="Erstes Kapitel" DMDID="DMD_2" ORDERLABEL="I">
        <mets:div ID="LOG_2" TYPE="section" LABEL="Vorrede"/>
      </mets:div>
      <mets:div ID="LOG_3" TYPE="chapter" LABEL="Anhang"/>
    </mets:div>
  </mets:structMap>
  <mets:structMap TYPE="PHYSICAL">
    <mets:div ID="PHYS_0" TYPE="physSequence">
      <mets:fptr FILEID="PDF_1"/>
      <mets:div ID="PHYS_3" TYPE="page" ORDER="3" ORDERLABEL="[3]">
        <mets:fptr FILEID="IMG_3"/>
        <mets:fptr FILEID="THUMB_3"/>
      </mets:div>
      <mets:div ID="PHYS_1" TYPE="page" ORDER="1" ORDERLABEL="I">
        <mets:fptr FILEID="IMG_1"/>
        <mets:fptr FILEID="THUMB_1"/>
        <mets:fptr FILEID="ALTO_1"/>
      </mets:div>
      <mets:div ID="PHYS_2" TYPE="page" ORDER="2" ORDERLABEL="II">
        <mets:fptr FILEID="IMG_2"/>
        <mets:fptr FILEID="THUMB_2"/>
        <mets:fptr FILEID="ALTO_2"/>
      </mets:div>
    </mets:div>
  </mets:structMap>
  <mets:structLink>
    <mets:smLink xlink:from="LOG_0" xlink:to="PHYS_1"/>
    <mets:smLink xlink:from="LOG_0" xlink:to="PHYS_2"/>
    <mets:smLink xlink:from="LOG_0" xlink:to="PHYS_3"/>
    <mets:smLink xlink:from="LOG_1" xlink:to="PHYS_2"/>
    <mets:smLink xlink:from="LOG_2" xlink:to="PHYS_2"/>
  </mets:structLink>
</mets:mets>"#;

/// Volume of a multi-volume work, with a pointer to its anchor file
pub const VOLUME_METS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<mets:mets xmlns:mets="http://www.loc.gov/METS/" xmlns:mods="http://www.loc.gov/mods/v3" xmlns:xlink="http://www.w3.org/1999/xlink">
  <mets:dmdSec ID="DMD_V">
    <mets:mdWrap MDTYPE="MODS">
      <mets:xmlData><mods:mods><mods:titleInfo><mods:title>Band 1</mods:title></mods:titleInfo></mods:mods></mets:xmlData>
    </mets:mdWrap>
  </mets:dmdSec>
  <mets:structMap TYPE="LOGICAL">
    <mets:div ID="LOG_ANCHOR" TYPE="periodical" DMDID="DMD_A">
      <mets:mptr LOCTYPE="URL" xlink:href="https://digital.example/mets/anchor.xml"/>
      <mets:div ID="LOG_VOL" TYPE="volume" DMDID="DMD_V" ORDER="1" ORDERLABEL="Bd. 1"/>
    </mets:div>
  </mets:structMap>
</mets:mets>"#;

/// ALTO page with two lines
pub const ALTO_PAGE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<alto xmlns="http://www.loc.gov/standards/alto/ns-v2#">
  <Layout>
    <Page ID="P1">
      <PrintSpace>
        <TextBlock ID="B1">
          <TextLine ID="L1">
            <String CONTENT="Chronik" HPOS="10" VPOS="20" WIDTH="80" HEIGHT="15"/>
            <SP/>
            <String CONTENT="der" HPOS="95" VPOS="20" WIDTH="30" HEIGHT="15"/>
          </TextLine>
          <TextLine ID="L2">
            <String CONTENT="Stadt" HPOS="10" VPOS="40" WIDTH="50" HEIGHT="15"/>
          </TextLine>
        </TextBlock>
      </PrintSpace>
    </Page>
  </Layout>
</alto>"#;

/// Field, structure and record definitions used across the METS tests
pub fn registry() -> InMemoryRegistry {
    InMemoryRegistry::new()
        .with_field(
            1,
            FieldSpec::new("classification").with_query("MODS", "./mods:classification"),
        )
        .with_field(1, FieldSpec::new("collection").with_default("Digitalisate"))
        .with_field(
            1,
            FieldSpec::new("owner")
                .with_query("MODS", "./mods:location/mods:physicalLocation")
                .with_default("Stadtarchiv"),
        )
        .with_field(
            1,
            FieldSpec::new("year")
                .sortable()
                .with_query("MODS", "./mods:originInfo/mods:dateIssued[@keyDate='yes']"),
        )
        .with_field(
            2,
            FieldSpec::new("shelf").sortable().with_sort_query(
                "MODS",
                "./mods:identifier[@type='urn']",
                "./mods:recordInfo/mods:recordIdentifier",
            ),
        )
        .with_structure(1, "monograph", Some("chapter"))
}

pub fn context_with_groups(fetcher: Arc<MemoryFetcher>, file_groups: FileGroups) -> Arc<DocumentContext> {
    let registry = Arc::new(registry());
    Arc::new(DocumentContext {
        file_groups,
        formats: Arc::new(FormatRegistry::with_defaults()),
        metadata: registry.clone(),
        structures: registry,
        fetcher,
    })
}

pub fn context_with(fetcher: Arc<MemoryFetcher>) -> Arc<DocumentContext> {
    context_with_groups(fetcher, FileGroups::default())
}
