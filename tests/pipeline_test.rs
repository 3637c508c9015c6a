use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

use crm_migrate::error::MigrationError;
use crm_migrate::pipeline::pipeline_config::PipelineConfig;
use crm_migrate::pipeline::table::Table;
use crm_migrate::pipeline::{DatasetPaths, Pipeline};
use crm_migrate::rules::ClassificationRules;

const REGIONS: &str = "\
Name,Id
Inheaden Europe,r-eu
Inheaden India,r-in
Inheaden Middle East,r-me
Inheaden UAE,r-ae
Inheaden Germany,r-de
";

const COMPANY_TABLE: &str = "\
Name,Id
Acme GmbH,c-acme
Globex,c-globex-old
Globex,c-globex
";

const COMPANIES_RAW: &str = "\
Company Id,Company Owner.id,Company Owner,Company Name,Email,Phone,Website,Tag,Country,Address,Created By.id,Created By,Modified By.id,Modified By,Created Time,Modified Time,Last Activity Time
1,u1,Jane Doe,Acme GmbH,info@acme.de,+49 30 1,acme.de,Partner,Deutschland,\"Hauptstr. 1, Berlin\",u1,Jane,u1,Jane,2024-01-01,2024-02-01,2024-03-01
2,u2,John Roe,Desert Co,,,desert.ae,,\"Dubai, UAE\",Sheikh Zayed Rd,u2,John,u2,John,2024-01-02,2024-02-02,
3,u3,Ann Poe,Curry Ltd,,,curry.in,,india,,u3,Ann,u3,Ann,2024-01-03,2024-02-03,
4,u4,Max Moe,Nowhere Inc,,,,,Atlantis,,u4,Max,u4,Max,2024-01-04,2024-02-04,
";

const CONTACTS_RAW: &str = "\
Contact Id,Contact Owner.id,Contact Owner,First Name,Last Name,Contact Name,Title,Position,Email,Private Email,Secondary Email,Phone,Home Phone,Mobile,Company Name.id,Company Name,Tag,Social Media,Country,Address,Primary Language Spoken,Secondary Language Spoken,Created By.id,Created By,Modified By.id,Modified By,Created Time,Modified Time,Last Activity Time,Unsubscribed Mode,Unsubscribed Time,Data Source
10,o1,Jürgen Müller,Anna,Schmidt,Anna Schmidt,Dr,CTO,anna@acme.de,anna@gmail.com,,+49 30 999,+49 30 1234567,,k1,Acme GmbH,\"VIP, Lead\",linkedin.com/in/anna,Germany,Berlin,German,English,o1,J,o1,J,2024-01-01,2024-02-01,2024-03-01,,,Import
11,o2,Traudel Boakye,Ravi,Kumar,Ravi Kumar,CEO,Founder,ravi@curry.in,,,,,+91 98,k2,Globex,,,India,,Hindi,,o2,T,o2,T,2024-01-02,2024-02-02,,,,
12,o3,Lars Grober,Sara,Haddad,Sara Haddad,Sir,,sara@desert.ae,nan,,,0501234567,,k3,Unknown Trading,,,KSA,,Arabic,,o3,L,o3,L,2024-01-03,2024-02-03,,,,
13,o4,-,Tom,Lee,Tom Lee,,,,,,,[],,,,,,Brazil,,,,o4,X,o4,X,2024-01-04,2024-02-04,,,,
";

const CONTACTS_SCHEMA: [&str; 20] = [
    "Contact Owner / User Email",
    "Name / First Name",
    "Name / Last Name",
    "Title",
    "Job Title",
    "Emails / Primary Email",
    "Emails / Additional Emails",
    "Phones / Primary Phone",
    "Phones / Additional Phones",
    "Mobile / Primary Phone Number",
    "Tags",
    "Linkedin / Link URL",
    "Address / Country",
    "Address / Address 1",
    "Primary Language",
    "Secondary Language",
    "Creation Date",
    "Last Update",
    "Company Id",
    "Contact Region / Id",
];

const COMPANIES_SCHEMA: [&str; 7] = [
    "Name",
    "Website / Link URL",
    "Address / Country",
    "Address / Address 1",
    "Creation Date",
    "Last update",
    "Company Region / Id",
];

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempdir().unwrap();
        let fixture = Self { dir };
        fixture.write("raw/companies.csv", COMPANIES_RAW);
        fixture.write("raw/contacts.csv", CONTACTS_RAW);
        fixture.write("twenty/regions.csv", REGIONS);
        fixture.write("twenty/company.csv", COMPANY_TABLE);
        fixture
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    fn write(&self, rel: &str, content: &str) {
        let path = self.path(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn companies_paths(&self, output: &str) -> DatasetPaths {
        DatasetPaths {
            input: self.path("raw/companies.csv"),
            output: self.path(output),
            region_table: self.path("twenty/regions.csv"),
            company_table: None,
        }
    }

    fn contacts_paths(&self, output: &str) -> DatasetPaths {
        DatasetPaths {
            input: self.path("raw/contacts.csv"),
            output: self.path(output),
            region_table: self.path("twenty/regions.csv"),
            company_table: Some(self.path("twenty/company.csv")),
        }
    }
}

fn pipeline(config: PipelineConfig) -> Pipeline {
    let rules = ClassificationRules::embedded().unwrap();
    Pipeline::new(config, &rules, "inheaden.io").unwrap()
}

fn read_output(path: &Path) -> Table {
    Table::read_csv(path, "output").unwrap()
}

#[test]
fn contacts_pipeline_produces_target_schema() -> Result<()> {
    let fx = Fixture::new();
    let result = pipeline(PipelineConfig::contacts()).run(&fx.contacts_paths("processed/peoples.csv"))?;

    assert_eq!(result.rows, 4);
    assert_eq!(result.columns, CONTACTS_SCHEMA.map(String::from).to_vec());

    let out = read_output(&fx.path("processed/peoples.csv"));
    assert_eq!(out.columns(), result.columns.as_slice());
    assert_eq!(out.len(), 4);
    Ok(())
}

#[test]
fn contacts_pipeline_transforms_fields() -> Result<()> {
    let fx = Fixture::new();
    let result = pipeline(PipelineConfig::contacts()).run(&fx.contacts_paths("out/peoples.csv"))?;
    let out = read_output(&fx.path("out/peoples.csv"));

    // Row 0: derived owner, honorific, resolved company, encoded arrays, grouped region
    assert_eq!(out.get(0, "Contact Owner / User Email"), Some("jurgen.muller@inheaden.io"));
    assert_eq!(out.get(0, "Title"), Some("Dr."));
    assert_eq!(out.get(0, "Job Title"), Some("CTO"));
    assert_eq!(out.get(0, "Company Id"), Some("c-acme"));
    assert_eq!(out.get(0, "Tags"), Some(r#"["VIP","Lead"]"#));
    assert_eq!(
        out.get(0, "Phones / Additional Phones"),
        Some(r#"[{"number":"301234567","callingCode":"+49","countryCode":"DE"}]"#)
    );
    assert_eq!(out.get(0, "Phones / Primary Phone"), Some("+49 30 999"));
    assert_eq!(out.get(0, "Emails / Additional Emails"), Some(r#"["anna@gmail.com"]"#));
    assert_eq!(out.get(0, "Contact Region / Id"), Some("r-eu"));
    assert_eq!(out.get(0, "Address / Country"), Some("Germany"));

    // Row 1: deprecated owner, cleared title, last duplicate company id
    assert_eq!(out.get(1, "Contact Owner / User Email"), Some("admin@inheaden.io"));
    assert_eq!(out.get(1, "Title"), None);
    assert_eq!(out.get(1, "Company Id"), Some("c-globex"));
    assert_eq!(out.get(1, "Tags"), Some("[]"));
    assert_eq!(out.get(1, "Contact Region / Id"), Some("r-in"));

    // Row 2: corrected owner, unlisted title kept, unknown company kept, unparsed phone
    assert_eq!(out.get(2, "Contact Owner / User Email"), Some("lars.groeber@inheaden.io"));
    assert_eq!(out.get(2, "Title"), Some("Sir"));
    assert_eq!(out.get(2, "Company Id"), Some("Unknown Trading"));
    assert_eq!(out.get(2, "Phones / Additional Phones"), Some("[]"));
    assert_eq!(out.get(2, "Emails / Additional Emails"), Some("[]"));
    assert_eq!(out.get(2, "Contact Region / Id"), Some("r-me"));

    // Row 3: placeholder owner, nothing to map, unknown country
    assert_eq!(out.get(3, "Contact Owner / User Email"), None);
    assert_eq!(out.get(3, "Company Id"), None);
    assert_eq!(out.get(3, "Phones / Additional Phones"), Some("[]"));
    assert_eq!(out.get(3, "Contact Region / Id"), None);

    assert_eq!(result.stats.unparsed_phones, 1);
    assert_eq!(result.stats.unresolved_companies, 1);
    assert_eq!(result.stats.rows_without_region, 1);
    Ok(())
}

#[test]
fn companies_pipeline_canonicalizes_and_assigns_regions() -> Result<()> {
    let fx = Fixture::new();
    let result = pipeline(PipelineConfig::companies()).run(&fx.companies_paths("processed/companies.csv"))?;

    assert_eq!(result.columns, COMPANIES_SCHEMA.map(String::from).to_vec());

    let out = read_output(&fx.path("processed/companies.csv"));
    assert_eq!(out.get(0, "Name"), Some("Acme GmbH"));
    assert_eq!(out.get(0, "Address / Country"), Some("Germany"));
    assert_eq!(out.get(0, "Address / Address 1"), Some("Hauptstr. 1, Berlin"));
    assert_eq!(out.get(0, "Company Region / Id"), Some("r-de"));

    assert_eq!(out.get(1, "Address / Country"), Some("United Arab Emirates"));
    assert_eq!(out.get(1, "Company Region / Id"), Some("r-ae"));

    assert_eq!(out.get(2, "Address / Country"), Some("India"));
    assert_eq!(out.get(2, "Company Region / Id"), Some("r-in"));

    assert_eq!(out.get(3, "Address / Country"), Some("Atlantis"));
    assert_eq!(out.get(3, "Company Region / Id"), None);
    Ok(())
}

#[test]
fn rerun_is_byte_identical() -> Result<()> {
    let fx = Fixture::new();
    let contacts = pipeline(PipelineConfig::contacts());

    let first = contacts.run(&fx.contacts_paths("a/peoples.csv"))?;
    let second = contacts.run(&fx.contacts_paths("b/peoples.csv"))?;

    assert_eq!(first.sha256, second.sha256);
    assert_eq!(
        fs::read(fx.path("a/peoples.csv"))?,
        fs::read(fx.path("b/peoples.csv"))?
    );
    Ok(())
}

#[test]
fn missing_input_writes_nothing() {
    let fx = Fixture::new();
    let mut paths = fx.contacts_paths("processed/peoples.csv");
    paths.company_table = Some(fx.path("twenty/missing.csv"));

    let err = pipeline(PipelineConfig::contacts()).run(&paths).unwrap_err();

    assert!(matches!(err, MigrationError::FileNotFound(ref p) if p.ends_with("missing.csv")));
    assert!(!fx.path("processed/peoples.csv").exists());
}

#[test]
fn missing_source_column_fails_the_run() {
    let fx = Fixture::new();
    fx.write("raw/companies.csv", "Company Name,Country\nAcme,Germany\n");

    let err = pipeline(PipelineConfig::companies())
        .run(&fx.companies_paths("processed/companies.csv"))
        .unwrap_err();

    assert!(matches!(err, MigrationError::MissingColumn { .. }));
    assert!(!fx.path("processed/companies.csv").exists());
}

#[test]
fn region_group_without_id_is_a_config_error() {
    let fx = Fixture::new();
    fx.write("twenty/regions.csv", "Name,Id\nInheaden Europe,r-eu\n");

    let err = pipeline(PipelineConfig::contacts())
        .run(&fx.contacts_paths("processed/peoples.csv"))
        .unwrap_err();

    assert!(matches!(err, MigrationError::Config(ref msg) if msg.contains("Inheaden India")));
}
