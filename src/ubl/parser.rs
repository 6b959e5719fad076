//! UBL-TR e-invoice document parsing.
//!
//! Vendor-tolerant, not schema-validating: source documents come from many
//! invoicing packages with inconsistent namespace prefixes, so every element
//! is matched on its local name only. The reader streams with a path stack
//! in document order and a scratch record accumulates fields until EOF.

use quick_xml::Reader;
use quick_xml::events::Event;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::core::{
    Invoice, InvoiceLine, MutabakatError, Party, TAX_TYPE_VAT, TaxSubtotal, parse_decimal,
    parse_flex_date,
};
use crate::encoding::decode_document;

/// Parse one UBL-TR XML payload into a canonical [`Invoice`].
///
/// Fails per document (malformed XML, no invoice number, no monetary total);
/// batch callers log the error, skip the document, and continue.
pub fn parse_invoice(bytes: &[u8], source_file: &str) -> Result<Invoice, MutabakatError> {
    let text = decode_document(bytes);
    let mut reader = Reader::from_str(&text);
    reader.config_mut().trim_text(true);

    let mut doc = ParsedDoc::default();
    let mut path: Vec<String> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let name = local_name(e.name().as_ref());

                match name.as_str() {
                    "InvoicedQuantity" => {
                        doc.current_unit_code = attr_value(e, "unitCode");
                    }
                    "ID" => {
                        doc.current_scheme_id = attr_value(e, "schemeID");
                    }
                    "PayableAmount" => {
                        doc.payable_currency_attr = attr_value(e, "currencyID")
                            .or(doc.payable_currency_attr.take());
                    }
                    "TaxTotal" if !in_path(&path, "InvoiceLine") => {
                        doc.tax_totals.push(TaxTotalScratch::default());
                    }
                    _ => {}
                }

                path.push(name);
            }
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().unwrap_or_default().to_string();
                if !text.is_empty() {
                    doc.handle_text(&path, &text);
                }
            }
            Ok(Event::End(_)) => {
                let ended = path.pop().unwrap_or_default();
                match ended.as_str() {
                    "InvoiceLine" => {
                        if let Some(line) = doc.current_line.take() {
                            doc.lines.push(line);
                        }
                    }
                    "TaxSubtotal" if !in_path(&path, "InvoiceLine") => {
                        if let Some(sub) = doc.current_subtotal.take() {
                            if let Some(tt) = doc.tax_totals.last_mut() {
                                tt.subtotal_seen = true;
                            }
                            doc.tax_breakdown.push(sub.into_subtotal());
                        }
                    }
                    "DespatchDocumentReference" => doc.finish_despatch(),
                    "OrderReference" => doc.finish_order(),
                    "PaymentMeans" => doc.finish_payment_means(),
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(MutabakatError::Document(format!(
                    "XML parse error in {source_file}: {e}"
                )));
            }
            _ => {}
        }
    }

    doc.into_invoice(source_file)
}

/// Local part of a possibly prefixed element name.
fn local_name(qname: &[u8]) -> String {
    let name = std::str::from_utf8(qname).unwrap_or("");
    name.rsplit(':').next().unwrap_or(name).to_string()
}

fn attr_value(e: &quick_xml::events::BytesStart<'_>, wanted: &str) -> Option<String> {
    for attr in e.attributes().flatten() {
        let key = std::str::from_utf8(attr.key.as_ref()).unwrap_or("");
        // Attributes may be namespace-prefixed as well.
        if key == wanted || key.ends_with(&format!(":{wanted}")) {
            return std::str::from_utf8(&attr.value).ok().map(str::to_string);
        }
    }
    None
}

fn in_path(path: &[String], name: &str) -> bool {
    path.iter().any(|p| p == name)
}

fn parent_of<'a>(path: &'a [String]) -> &'a str {
    if path.len() >= 2 {
        path[path.len() - 2].as_str()
    } else {
        ""
    }
}

#[derive(Default)]
struct TaxTotalScratch {
    header_amount: Option<Decimal>,
    subtotal_seen: bool,
}

#[derive(Default)]
struct SubtotalScratch {
    type_code: Option<String>,
    rate: Option<String>,
    taxable: Option<String>,
    amount: Option<String>,
}

impl SubtotalScratch {
    fn into_subtotal(self) -> TaxSubtotal {
        TaxSubtotal {
            type_code: self.type_code.unwrap_or_default(),
            rate: self.rate.as_deref().map(parse_decimal).unwrap_or_default(),
            taxable_amount: self.taxable.as_deref().map(parse_decimal).unwrap_or_default(),
            tax_amount: self.amount.as_deref().map(parse_decimal).unwrap_or_default(),
        }
    }
}

#[derive(Default)]
struct ParsedParty {
    registration_name: Option<String>,
    party_name: Option<String>,
    first_name: Option<String>,
    family_name: Option<String>,
    /// (schemeID, value) pairs from PartyIdentification.
    ids: Vec<(Option<String>, String)>,
    tax_office: Option<String>,
    street: Option<String>,
    building: Option<String>,
    district: Option<String>,
    city: Option<String>,
}

impl ParsedParty {
    fn into_party(self) -> Party {
        // Name resolution tiers: registered legal name, trading name,
        // natural-person name, unknown.
        let person = match (&self.first_name, &self.family_name) {
            (Some(f), Some(l)) => Some(format!("{f} {l}")),
            (Some(f), None) => Some(f.clone()),
            (None, Some(l)) => Some(l.clone()),
            (None, None) => None,
        };
        let name = self
            .registration_name
            .or(self.party_name)
            .or(person)
            .unwrap_or_else(|| "unknown".into());

        let tax_id = self
            .ids
            .iter()
            .find(|(scheme, _)| {
                matches!(scheme.as_deref(), Some("VKN") | Some("TCKN"))
            })
            .or_else(|| self.ids.iter().find(|(_, v)| v.len() >= 10))
            .map(|(_, v)| v.clone());

        let address = match (&self.street, &self.building) {
            (Some(s), Some(b)) => Some(format!("{s} No:{b}")),
            (Some(s), None) => Some(s.clone()),
            _ => None,
        };

        Party {
            name,
            tax_id,
            tax_office: self.tax_office,
            address,
            city: self.city,
            district: self.district,
        }
    }
}

#[derive(Default)]
struct LineScratch {
    item_name: Option<String>,
    item_description: Option<String>,
    quantity: Option<String>,
    unit: Option<String>,
    price: Option<String>,
    line_total: Option<String>,
    category_rate: Option<String>,
    subtotal_rate: Option<String>,
}

impl LineScratch {
    fn into_line(self) -> InvoiceLine {
        let name = self.item_name.unwrap_or_default();
        let description = match &self.item_description {
            Some(d) if !d.is_empty() && *d != name => {
                if name.is_empty() {
                    d.clone()
                } else {
                    format!("{name} ({d})")
                }
            }
            _ if name.is_empty() => "Genel Hizmet/Ürün".into(),
            _ => name,
        };
        // Percent lives on TaxCategory in most vendor output, on the
        // subtotal itself in older documents.
        let rate = self
            .category_rate
            .as_deref()
            .map(parse_decimal)
            .filter(|r| !r.is_zero())
            .or_else(|| self.subtotal_rate.as_deref().map(parse_decimal))
            .unwrap_or(Decimal::ZERO);
        InvoiceLine {
            description,
            quantity: self.quantity.as_deref().map(parse_decimal).unwrap_or_default(),
            unit: self.unit.unwrap_or_else(|| "Adet".into()),
            unit_price: self.price.as_deref().map(parse_decimal).unwrap_or_default(),
            vat_rate: rate,
            line_total: self
                .line_total
                .as_deref()
                .map(parse_decimal)
                .unwrap_or_default(),
        }
    }
}

#[derive(Default)]
struct ParsedDoc {
    number: Option<String>,
    issue_date: Option<String>,
    currency: Option<String>,
    payable_currency_attr: Option<String>,
    ettn: Option<String>,
    profile_id: Option<String>,
    type_code: Option<String>,
    notes: Vec<String>,

    line_extension: Option<String>,
    tax_exclusive: Option<String>,
    tax_inclusive: Option<String>,
    payable: Option<String>,
    allowance_total: Option<String>,

    tax_totals: Vec<TaxTotalScratch>,
    tax_breakdown: Vec<TaxSubtotal>,
    current_subtotal: Option<SubtotalScratch>,
    withholding: Decimal,

    pricing_rate: Option<String>,
    pricing_target: Option<String>,
    payment_rate: Option<String>,

    supplier: ParsedParty,
    customer: ParsedParty,

    lines: Vec<LineScratch>,
    current_line: Option<LineScratch>,

    despatch_refs: Vec<String>,
    current_despatch_id: Option<String>,
    current_despatch_date: Option<String>,
    order_refs: Vec<String>,
    current_order_id: Option<String>,
    current_order_date: Option<String>,
    payment_means: Vec<String>,
    current_iban: Option<String>,
    current_pay_channel: Option<String>,

    current_unit_code: Option<String>,
    current_scheme_id: Option<String>,
}

impl ParsedDoc {
    fn handle_text(&mut self, path: &[String], text: &str) {
        let leaf = path.last().map(|s| s.as_str()).unwrap_or("");
        let parent = parent_of(path);

        let in_supplier = in_path(path, "AccountingSupplierParty");
        let in_buyer = in_path(path, "AccountingCustomerParty");
        let in_line = in_path(path, "InvoiceLine");
        let in_tax_total = in_path(path, "TaxTotal") && !in_line;
        let in_withholding = in_path(path, "WithholdingTaxTotal");
        let in_despatch = in_path(path, "DespatchDocumentReference");
        let in_order = in_path(path, "OrderReference");
        let in_payment = in_path(path, "PaymentMeans");

        // Document-level fields, first occurrence wins.
        if !in_supplier && !in_buyer && !in_line && !in_tax_total && !in_withholding {
            match leaf {
                // The invoice number is the first ID at the document root;
                // later IDs (references, accounts) must not clobber it.
                "ID" if path.len() == 2 && self.number.is_none() => {
                    self.number = Some(text.to_string());
                }
                "UUID" if path.len() == 2 && self.ettn.is_none() => {
                    self.ettn = Some(text.to_string());
                }
                "IssueDate" if path.len() == 2 && self.issue_date.is_none() => {
                    self.issue_date = Some(text.to_string());
                }
                "ProfileID" if path.len() == 2 => self.profile_id = Some(text.to_string()),
                "InvoiceTypeCode" if path.len() == 2 => self.type_code = Some(text.to_string()),
                "DocumentCurrencyCode" => self.currency = Some(text.to_string()),
                "Note" if path.len() == 2 => self.notes.push(text.to_string()),
                _ => {}
            }
        }

        // Monetary totals
        if parent == "LegalMonetaryTotal" {
            match leaf {
                "LineExtensionAmount" => self.line_extension = Some(text.to_string()),
                "TaxExclusiveAmount" => self.tax_exclusive = Some(text.to_string()),
                "TaxInclusiveAmount" => self.tax_inclusive = Some(text.to_string()),
                "PayableAmount" => self.payable = Some(text.to_string()),
                "AllowanceTotalAmount" => self.allowance_total = Some(text.to_string()),
                _ => {}
            }
        }

        // Document-level tax totals, split by tax type code
        if in_tax_total && !in_withholding {
            if leaf == "TaxAmount" && parent == "TaxTotal" {
                if let Some(tt) = self.tax_totals.last_mut() {
                    tt.header_amount = Some(parse_decimal(text));
                }
            }
            if in_path(path, "TaxSubtotal") {
                let sub = self.current_subtotal.get_or_insert_with(Default::default);
                match leaf {
                    "TaxableAmount" if parent == "TaxSubtotal" => {
                        sub.taxable = Some(text.to_string());
                    }
                    "TaxAmount" if parent == "TaxSubtotal" => {
                        sub.amount = Some(text.to_string());
                    }
                    "Percent" => sub.rate = Some(text.to_string()),
                    "TaxTypeCode" => sub.type_code = Some(text.to_string()),
                    _ => {}
                }
            }
        }

        // Withholding (tevkifat) — the header amount only, subtotals repeat it.
        if in_withholding && leaf == "TaxAmount" && parent == "WithholdingTaxTotal" {
            self.withholding += parse_decimal(text);
        }

        // Embedded exchange rates
        if in_path(path, "PricingExchangeRate") {
            match leaf {
                "CalculationRate" => self.pricing_rate = Some(text.to_string()),
                "TargetCurrencyCode" => self.pricing_target = Some(text.to_string()),
                _ => {}
            }
        }
        if in_path(path, "PaymentExchangeRate") && leaf == "CalculationRate" {
            self.payment_rate = Some(text.to_string());
        }

        // Parties
        if in_supplier || in_buyer {
            let party = if in_supplier {
                &mut self.supplier
            } else {
                &mut self.customer
            };
            match leaf {
                "RegistrationName" => party.registration_name = Some(text.to_string()),
                "Name" if parent == "PartyName" => party.party_name = Some(text.to_string()),
                "FirstName" if parent == "Person" => party.first_name = Some(text.to_string()),
                "FamilyName" if parent == "Person" => party.family_name = Some(text.to_string()),
                "ID" if parent == "PartyIdentification" => {
                    party
                        .ids
                        .push((self.current_scheme_id.take(), text.to_string()));
                }
                "Name" if parent == "TaxScheme" && in_path(path, "PartyTaxScheme") => {
                    party.tax_office = Some(text.to_string());
                }
                "StreetName" if parent == "PostalAddress" => {
                    party.street = Some(text.to_string());
                }
                "BuildingNumber" if parent == "PostalAddress" => {
                    party.building = Some(text.to_string());
                }
                "CitySubdivisionName" if parent == "PostalAddress" => {
                    party.district = Some(text.to_string());
                }
                "CityName" if parent == "PostalAddress" => {
                    party.city = Some(text.to_string());
                }
                _ => {}
            }
        }

        // Invoice lines
        if in_line {
            let line = self.current_line.get_or_insert_with(Default::default);
            match leaf {
                "Name" if parent == "Item" => line.item_name = Some(text.to_string()),
                "Description" if parent == "Item" => {
                    line.item_description = Some(text.to_string());
                }
                "InvoicedQuantity" => {
                    line.quantity = Some(text.to_string());
                    line.unit = self.current_unit_code.take();
                }
                "PriceAmount" if parent == "Price" => line.price = Some(text.to_string()),
                "LineExtensionAmount" if parent == "InvoiceLine" => {
                    line.line_total = Some(text.to_string());
                }
                "Percent" if parent == "TaxCategory" => {
                    line.category_rate = Some(text.to_string());
                }
                "Percent" if parent == "TaxSubtotal" => {
                    line.subtotal_rate = Some(text.to_string());
                }
                _ => {}
            }
        }

        // References
        if in_despatch {
            match leaf {
                "ID" => self.current_despatch_id = Some(text.to_string()),
                "IssueDate" => self.current_despatch_date = Some(text.to_string()),
                _ => {}
            }
        }
        if in_order {
            match leaf {
                "ID" => self.current_order_id = Some(text.to_string()),
                "IssueDate" => self.current_order_date = Some(text.to_string()),
                _ => {}
            }
        }

        // Payment means: IBAN from PayeeFinancialAccount, else channel code
        if in_payment {
            match leaf {
                "ID" if parent == "PayeeFinancialAccount" => {
                    self.current_iban = Some(text.to_string());
                }
                "PaymentChannelCode" => {
                    self.current_pay_channel = Some(text.to_string());
                }
                _ => {}
            }
        }
    }

    fn finish_despatch(&mut self) {
        if let Some(id) = self.current_despatch_id.take() {
            let formatted = match self.current_despatch_date.take() {
                Some(d) => format!("{id} ({d})"),
                None => id,
            };
            self.despatch_refs.push(formatted);
        }
        self.current_despatch_date = None;
    }

    fn finish_order(&mut self) {
        if let Some(id) = self.current_order_id.take() {
            let formatted = match self.current_order_date.take() {
                Some(d) => format!("{id} ({d})"),
                None => id,
            };
            self.order_refs.push(formatted);
        }
        self.current_order_date = None;
    }

    fn finish_payment_means(&mut self) {
        if let Some(iban) = self.current_iban.take() {
            self.payment_means.push(format!("IBAN: {iban}"));
        } else if let Some(channel) = self.current_pay_channel.take() {
            self.payment_means.push(format!("Kanal: {channel}"));
        }
        self.current_pay_channel = None;
    }

    fn into_invoice(mut self, source_file: &str) -> Result<Invoice, MutabakatError> {
        let number = self.number.take().ok_or_else(|| {
            MutabakatError::Document(format!("{source_file}: no invoice number (ID) found"))
        })?;

        if self.tax_inclusive.is_none() && self.payable.is_none() {
            return Err(MutabakatError::Document(format!(
                "{source_file}: invoice {number} has no monetary total"
            )));
        }

        let currency = self
            .currency
            .or(self.payable_currency_attr)
            .unwrap_or_else(|| "TRY".into());

        let payable = self.payable.as_deref().map(parse_decimal).unwrap_or_default();
        let tax_inclusive = self
            .tax_inclusive
            .as_deref()
            .map(parse_decimal)
            .unwrap_or_default();
        let gross = if tax_inclusive.is_zero() {
            payable
        } else {
            tax_inclusive
        };

        // Only tax type 0015 counts as VAT; everything else is other tax.
        let mut vat = Decimal::ZERO;
        let mut other_tax = Decimal::ZERO;
        for sub in &self.tax_breakdown {
            let amount = sub.tax_amount;
            if sub.type_code == TAX_TYPE_VAT {
                vat += amount;
            } else {
                other_tax += amount;
            }
        }
        // Old-format documents carry only a header TaxAmount with no
        // subtotals; treat that figure as VAT.
        if vat.is_zero() && other_tax.is_zero() {
            for tt in &self.tax_totals {
                if !tt.subtotal_seen {
                    if let Some(amount) = tt.header_amount {
                        vat += amount;
                    }
                }
            }
        }

        // Withholding reduces the payable, not the gross, so it stays out
        // of the matrah fallback.
        let mut tax_exclusive = self
            .tax_exclusive
            .as_deref()
            .map(parse_decimal)
            .unwrap_or_default();
        if tax_exclusive.is_zero() {
            tax_exclusive = gross - vat - other_tax;
        }

        // Totals invariant: gross = tax-exclusive + VAT + other taxes. When
        // the declared figures violate it, VAT is re-derived as the residual.
        let residual = gross - tax_exclusive - other_tax;
        if (gross - tax_exclusive - vat - other_tax).abs() > dec!(0.01)
            && residual > Decimal::ZERO
        {
            vat = residual;
        }

        let embedded_rate = self
            .pricing_rate
            .as_deref()
            .map(parse_decimal)
            .filter(|r| {
                *r > Decimal::ZERO
                    && matches!(self.pricing_target.as_deref(), None | Some("TRY"))
            })
            .or_else(|| {
                self.payment_rate
                    .as_deref()
                    .map(parse_decimal)
                    .filter(|r| *r > Decimal::ZERO)
            });

        Ok(Invoice {
            number,
            issue_date: self.issue_date.as_deref().and_then(parse_flex_date),
            currency_code: currency,
            gross_amount: gross,
            tax_exclusive_amount: tax_exclusive,
            payable_amount: payable,
            line_extension_amount: self
                .line_extension
                .as_deref()
                .map(parse_decimal)
                .unwrap_or_default(),
            allowance_total: self
                .allowance_total
                .as_deref()
                .map(parse_decimal)
                .unwrap_or_default(),
            vat_amount: vat,
            other_tax_amount: other_tax,
            withholding_amount: self.withholding,
            embedded_rate,
            supplier: self.supplier.into_party(),
            customer: self.customer.into_party(),
            lines: self.lines.into_iter().map(LineScratch::into_line).collect(),
            tax_breakdown: self.tax_breakdown,
            notes: self.notes,
            despatch_refs: self.despatch_refs,
            order_refs: self.order_refs,
            payment_means: self.payment_means,
            ettn: self.ettn,
            profile_id: self.profile_id,
            type_code: self.type_code,
            source_file: source_file.to_string(),
        })
    }
}
